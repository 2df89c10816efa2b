use crate::period::PeriodKey;
use crate::util::{format_money, format_pct};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// Decoded spreadsheet: one header row plus data rows, all cells as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawSheet {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Cell text, `""` past the end of a short row.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// 1-based spreadsheet row number of a data row (the header is row 1).
    pub fn sheet_row_number(row: usize) -> usize {
        row + 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetFormat {
    Long,
    Wide,
}

impl fmt::Display for SheetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetFormat::Long => write!(f, "long"),
            SheetFormat::Wide => write!(f, "wide"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalField {
    Comercial,
    Cliente,
    Mes,
    Facturacion,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 4] = [
        CanonicalField::Comercial,
        CanonicalField::Cliente,
        CanonicalField::Mes,
        CanonicalField::Facturacion,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::Comercial => "comercial",
            CanonicalField::Cliente => "cliente",
            CanonicalField::Mes => "mes",
            CanonicalField::Facturacion => "facturacion",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where each canonical field lives in the source sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnMapping {
    Long {
        salesperson: usize,
        client: usize,
        period: usize,
        revenue: usize,
    },
    /// `periods` is kept in chronological order, ties by column position.
    Wide {
        salesperson: usize,
        client: usize,
        periods: Vec<(PeriodKey, usize)>,
    },
}

impl ColumnMapping {
    pub fn format(&self) -> SheetFormat {
        match self {
            ColumnMapping::Long { .. } => SheetFormat::Long,
            ColumnMapping::Wide { .. } => SheetFormat::Wide,
        }
    }

    pub fn salesperson_col(&self) -> usize {
        match self {
            ColumnMapping::Long { salesperson, .. } | ColumnMapping::Wide { salesperson, .. } => {
                *salesperson
            }
        }
    }

    pub fn client_col(&self) -> usize {
        match self {
            ColumnMapping::Long { client, .. } | ColumnMapping::Wide { client, .. } => *client,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalRow {
    pub salesperson: String,
    pub client: String,
    pub period: PeriodKey,
    pub gross_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommissionRow {
    pub salesperson: String,
    pub client: String,
    pub period: PeriodKey,
    pub gross_revenue: Decimal,
    pub commission_amount: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub total_revenue: Decimal,
    pub total_commission: Decimal,
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    MissingRevenue,
    NonNumericRevenue(String),
    NegativeRevenue(Decimal),
    MissingSalesperson,
    MissingClient,
    /// Merging into an earlier row with the same key would overflow.
    RevenueOverflow(Decimal),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingRevenue => write!(f, "missing revenue"),
            SkipReason::NonNumericRevenue(raw) => write!(f, "non-numeric revenue '{}'", raw),
            SkipReason::NegativeRevenue(v) => write!(f, "negative revenue {}", v),
            SkipReason::MissingSalesperson => write!(f, "missing salesperson"),
            SkipReason::MissingClient => write!(f, "missing client"),
            SkipReason::RevenueOverflow(v) => write!(f, "revenue {} overflows the merged total", v),
        }
    }
}

/// Non-fatal per-row issue, reported to the caller alongside the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Warning {
    RowSkipped {
        row: usize,
        column: Option<String>,
        reason: SkipReason,
    },
    UnparseablePeriod {
        row: usize,
        label: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::RowSkipped {
                row,
                column: Some(col),
                reason,
            } => write!(f, "row {} column '{}' skipped: {}", row, col, reason),
            Warning::RowSkipped { row, reason, .. } => write!(f, "row {} skipped: {}", row, reason),
            Warning::UnparseablePeriod { row, label } => {
                write!(f, "row {}: unparseable period '{}'", row, label)
            }
        }
    }
}

fn money(d: &Decimal) -> String {
    format_money(*d)
}

fn pct(d: &Decimal) -> String {
    format_pct(*d)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct PeriodTotals {
    #[tabled(rename = "Mes")]
    pub period: PeriodKey,
    #[tabled(rename = "Facturación", display_with = "money")]
    pub revenue: Decimal,
    #[tabled(rename = "Comisión", display_with = "money")]
    pub commission: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct SalespersonShare {
    #[tabled(rename = "Comercial")]
    pub salesperson: String,
    #[tabled(rename = "Comisión", display_with = "money")]
    pub commission: Decimal,
    #[tabled(rename = "Cuota", display_with = "pct")]
    pub share_pct: Decimal,
}

/// Minimum bar ratio shown for a ranked client, so tiny values stay visible.
pub fn min_display_ratio() -> Decimal {
    Decimal::new(2, 2)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct ClientRank {
    #[tabled(rename = "#")]
    pub rank: usize,
    #[tabled(rename = "Cliente")]
    pub client: String,
    #[tabled(rename = "Facturación", display_with = "money")]
    pub revenue: Decimal,
    #[tabled(rename = "Comisión", display_with = "money")]
    pub commission: Decimal,
    #[tabled(skip)]
    pub ratio_to_max: Decimal,
}

impl ClientRank {
    /// `ratio_to_max` floor-clamped for bar rendering; the stored ratio is untouched.
    pub fn display_ratio(&self) -> Decimal {
        self.ratio_to_max.max(min_display_ratio())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct ClientTotals {
    #[tabled(rename = "Cliente")]
    pub client: String,
    #[tabled(rename = "Facturación", display_with = "money")]
    pub revenue: Decimal,
    #[tabled(rename = "Comisión", display_with = "money")]
    pub commission: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct SalespersonGroup {
    #[tabled(rename = "Comercial")]
    pub salesperson: String,
    #[tabled(rename = "Facturación", display_with = "money")]
    pub revenue: Decimal,
    #[tabled(rename = "Comisión", display_with = "money")]
    pub commission: Decimal,
    #[tabled(skip)]
    pub clients: Vec<ClientTotals>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodComparison {
    pub previous: PeriodTotals,
    pub current: PeriodTotals,
    pub delta: Decimal,
    pub pct: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertKind {
    /// Present in both periods with lower revenue in the later one.
    Decline,
    /// Present in the earlier period only.
    Disappeared,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Decline => write!(f, "caída"),
            AlertKind::Disappeared => write!(f, "sin actividad"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct DropAlert {
    #[tabled(rename = "Cliente")]
    pub client: String,
    #[tabled(rename = "Anterior", display_with = "money")]
    pub previous_revenue: Decimal,
    #[tabled(rename = "Actual", display_with = "money")]
    pub current_revenue: Decimal,
    #[tabled(rename = "Δ", display_with = "money")]
    pub delta: Decimal,
    #[tabled(rename = "Δ %", display_with = "pct")]
    pub pct: Decimal,
    #[tabled(rename = "Tipo")]
    pub kind: AlertKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Attainment {
    NoGoal,
    Percent { value: Decimal, capped: bool },
}

impl fmt::Display for Attainment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attainment::NoGoal => write!(f, "sin objetivo definido"),
            Attainment::Percent { value, capped } => {
                write!(f, "{}{}", format_pct(*value), if *capped { "+" } else { "" })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct GoalAttainment {
    #[tabled(rename = "Comercial")]
    pub salesperson: String,
    #[tabled(rename = "Comisión", display_with = "money")]
    pub commission: Decimal,
    #[tabled(rename = "Objetivo", display_with = "goal")]
    pub goal: Option<Decimal>,
    #[tabled(rename = "Cumplimiento")]
    pub attainment: Attainment,
}

fn goal(g: &Option<Decimal>) -> String {
    g.map(format_money).unwrap_or_else(|| "-".to_string())
}
