// Derived analytical views over filtered commission rows. Every function
// here is a pure function of its arguments.
use crate::period::{parse_period, PeriodKey};
use crate::types::{
    AlertKind, Attainment, ClientRank, ClientTotals, CommissionRow, DropAlert, GoalAttainment,
    PeriodComparison, PeriodTotals, SalespersonGroup, SalespersonShare,
};
use crate::util::normalize_text;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const DROP_ALERT_LIMIT: usize = 5;

/// Display ceiling for goal attainment, in percent.
pub fn attainment_cap() -> Decimal {
    Decimal::from(999)
}

/// Salesperson and period selections; an empty list selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisFilter {
    pub salespersons: Vec<String>,
    pub periods: Vec<String>,
}

// Unparseable keys compare by their displayed label, so a blank period
// matches the "sin fecha" option offered by inspection.
fn period_match_key(key: &PeriodKey) -> PeriodKey {
    match key {
        PeriodKey::Unparseable(_) => PeriodKey::Unparseable(normalize_text(&key.to_string())),
        valid => valid.clone(),
    }
}

/// Salesperson membership first, then period membership. Names compare
/// accent and case-insensitively; period labels compare by parsed key.
pub fn filter_rows(rows: &[CommissionRow], filter: &AnalysisFilter) -> Vec<CommissionRow> {
    let salespersons: HashSet<String> = filter.salespersons.iter().map(|s| normalize_text(s)).collect();
    let periods: HashSet<PeriodKey> = filter
        .periods
        .iter()
        .map(|p| period_match_key(&parse_period(p)))
        .collect();
    rows.iter()
        .filter(|r| salespersons.is_empty() || salespersons.contains(&normalize_text(&r.salesperson)))
        .filter(|r| periods.is_empty() || periods.contains(&period_match_key(&r.period)))
        .cloned()
        .collect()
}

#[derive(Default)]
struct Acc {
    revenue: Decimal,
    commission: Decimal,
}

impl Acc {
    // Saturates; rows that passed `totals` never reach the bound.
    fn add(&mut self, r: &CommissionRow) {
        self.revenue = self.revenue.saturating_add(r.gross_revenue);
        self.commission = self.commission.saturating_add(r.commission_amount);
    }
}

fn group_by<K, F>(rows: &[CommissionRow], key: F) -> BTreeMap<K, Acc>
where
    K: Ord,
    F: Fn(&CommissionRow) -> K,
{
    let mut map: BTreeMap<K, Acc> = BTreeMap::new();
    for r in rows {
        map.entry(key(r)).or_default().add(r);
    }
    map
}

/// Descending by commission, ties broken by name ascending.
fn by_commission_desc(a: (&Decimal, &str), b: (&Decimal, &str)) -> Ordering {
    b.0.cmp(a.0).then_with(|| a.1.cmp(b.1))
}

/// `part / whole * 100`, 0 for a zero `whole`, saturating at the
/// `Decimal` bounds when the ratio is too large to represent.
fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    match part.checked_div(whole) {
        Some(ratio) => ratio.saturating_mul(Decimal::ONE_HUNDRED),
        None if part.is_sign_negative() != whole.is_sign_negative() => Decimal::MIN,
        None => Decimal::MAX,
    }
}

/// Revenue and commission per period, ascending; unparseable periods last.
pub fn time_series(rows: &[CommissionRow]) -> Vec<PeriodTotals> {
    group_by(rows, |r| r.period.clone())
        .into_iter()
        .map(|(period, acc)| PeriodTotals {
            period,
            revenue: acc.revenue,
            commission: acc.commission,
        })
        .collect()
}

pub fn salesperson_distribution(rows: &[CommissionRow]) -> Vec<SalespersonShare> {
    let grouped = group_by(rows, |r| r.salesperson.clone());
    let total: Decimal = grouped.values().map(|a| a.commission).sum();
    let mut out: Vec<SalespersonShare> = grouped
        .into_iter()
        .map(|(salesperson, acc)| SalespersonShare {
            salesperson,
            commission: acc.commission,
            share_pct: percent_of(acc.commission, total),
        })
        .collect();
    out.sort_by(|a, b| {
        by_commission_desc((&a.commission, a.salesperson.as_str()), (&b.commission, b.salesperson.as_str()))
    });
    out
}

/// Clients by commission, descending. `top_n` keeps a prefix; the ratio is
/// relative to the largest commission inside that prefix.
pub fn client_ranking(rows: &[CommissionRow], top_n: Option<usize>) -> Vec<ClientRank> {
    let mut clients: Vec<(String, Acc)> = group_by(rows, |r| r.client.clone()).into_iter().collect();
    clients.sort_by(|a, b| by_commission_desc((&a.1.commission, a.0.as_str()), (&b.1.commission, b.0.as_str())));
    if let Some(n) = top_n {
        clients.truncate(n);
    }
    let max = clients
        .iter()
        .map(|(_, acc)| acc.commission)
        .max()
        .unwrap_or_default();
    clients
        .into_iter()
        .enumerate()
        .map(|(idx, (client, acc))| ClientRank {
            rank: idx + 1,
            client,
            revenue: acc.revenue,
            commission: acc.commission,
            ratio_to_max: if max.is_zero() {
                Decimal::ZERO
            } else {
                acc.commission / max
            },
        })
        .collect()
}

/// Salesperson → client detail, both levels descending by commission.
pub fn grouped_by_salesperson(rows: &[CommissionRow]) -> Vec<SalespersonGroup> {
    let mut nested: BTreeMap<String, (Acc, BTreeMap<String, Acc>)> = BTreeMap::new();
    for r in rows {
        let (total, clients) = nested.entry(r.salesperson.clone()).or_default();
        total.add(r);
        clients.entry(r.client.clone()).or_default().add(r);
    }
    let mut groups: Vec<SalespersonGroup> = nested
        .into_iter()
        .map(|(salesperson, (total, clients))| {
            let mut clients: Vec<ClientTotals> = clients
                .into_iter()
                .map(|(client, acc)| ClientTotals {
                    client,
                    revenue: acc.revenue,
                    commission: acc.commission,
                })
                .collect();
            clients.sort_by(|a, b| {
                by_commission_desc((&a.commission, a.client.as_str()), (&b.commission, b.client.as_str()))
            });
            SalespersonGroup {
                salesperson,
                revenue: total.revenue,
                commission: total.commission,
                clients,
            }
        })
        .collect();
    groups.sort_by(|a, b| {
        by_commission_desc((&a.commission, a.salesperson.as_str()), (&b.commission, b.salesperson.as_str()))
    });
    groups
}

/// The (previous, current) periods to compare.
///
/// With two or more valid periods explicitly selected, the chronological
/// first and last of that selection; otherwise the first and last periods
/// of the series. Both must be present in the series.
pub fn comparison_pair(
    series: &[PeriodTotals],
    selected_periods: &[String],
) -> Option<(PeriodKey, PeriodKey)> {
    let mut explicit: Vec<PeriodKey> = selected_periods
        .iter()
        .map(|l| parse_period(l))
        .filter(PeriodKey::is_valid)
        .collect();
    explicit.sort();
    explicit.dedup();

    let candidates: Vec<PeriodKey> = if explicit.len() >= 2 {
        explicit
    } else {
        series
            .iter()
            .map(|p| p.period.clone())
            .filter(PeriodKey::is_valid)
            .collect()
    };
    let (first, last) = (candidates.first()?, candidates.last()?);
    if first == last {
        return None;
    }
    let present = |k: &PeriodKey| series.iter().any(|p| &p.period == k);
    if present(first) && present(last) {
        Some((first.clone(), last.clone()))
    } else {
        None
    }
}

pub fn period_comparison(
    series: &[PeriodTotals],
    selected_periods: &[String],
) -> Option<PeriodComparison> {
    let (prev_key, cur_key) = comparison_pair(series, selected_periods)?;
    let find = |k: &PeriodKey| series.iter().find(|p| &p.period == k).cloned();
    let previous = find(&prev_key)?;
    let current = find(&cur_key)?;
    let delta = current.commission - previous.commission;
    Some(PeriodComparison {
        pct: percent_of(delta, previous.commission),
        previous,
        current,
        delta,
    })
}

/// Clients whose revenue fell between the two compared periods, most
/// negative delta first, at most `DROP_ALERT_LIMIT`.
///
/// Clients billed in the previous period and absent from the current one
/// are reported as `Disappeared` with a -100% drop.
pub fn drop_alerts(rows: &[CommissionRow], pair: &(PeriodKey, PeriodKey)) -> Vec<DropAlert> {
    let (prev_key, cur_key) = pair;
    let mut previous: BTreeMap<&str, Decimal> = BTreeMap::new();
    let mut current: BTreeMap<&str, Decimal> = BTreeMap::new();
    for r in rows {
        if &r.period == prev_key {
            let prev = previous.entry(r.client.as_str()).or_default();
            *prev = prev.saturating_add(r.gross_revenue);
        } else if &r.period == cur_key {
            let cur = current.entry(r.client.as_str()).or_default();
            *cur = cur.saturating_add(r.gross_revenue);
        }
    }

    let mut alerts: Vec<DropAlert> = previous
        .into_iter()
        .filter_map(|(client, prev)| {
            let (cur, kind) = match current.get(client) {
                Some(cur) => (*cur, AlertKind::Decline),
                None => (Decimal::ZERO, AlertKind::Disappeared),
            };
            let delta = cur - prev;
            if delta >= Decimal::ZERO {
                return None;
            }
            Some(DropAlert {
                client: client.to_string(),
                previous_revenue: prev,
                current_revenue: cur,
                delta,
                pct: percent_of(delta, prev),
                kind,
            })
        })
        .collect();
    alerts.sort_by(|a, b| a.delta.cmp(&b.delta).then_with(|| a.client.cmp(&b.client)));
    alerts.truncate(DROP_ALERT_LIMIT);
    alerts
}

/// Attainment per salesperson in `distribution` order. Missing or
/// non-positive goals read as "no goal defined", never as 0%.
pub fn goal_attainment(
    distribution: &[SalespersonShare],
    goals: &HashMap<String, Decimal>,
) -> Vec<GoalAttainment> {
    let goals: HashMap<String, Decimal> = goals
        .iter()
        .map(|(name, goal)| (normalize_text(name), *goal))
        .collect();
    distribution
        .iter()
        .map(|share| {
            let goal = goals
                .get(&normalize_text(&share.salesperson))
                .copied()
                .filter(|g| *g > Decimal::ZERO);
            let attainment = match goal {
                Some(g) => {
                    let raw = percent_of(share.commission, g);
                    Attainment::Percent {
                        value: raw.min(attainment_cap()),
                        capped: raw > attainment_cap(),
                    }
                }
                None => Attainment::NoGoal,
            };
            GoalAttainment {
                salesperson: share.salesperson.clone(),
                commission: share.commission,
                goal,
                attainment,
            }
        })
        .collect()
}
