use crate::period::{parse_period, PeriodKey};
use crate::types::{CanonicalRow, ColumnMapping, RawSheet, SkipReason, Warning};
use crate::util::parse_amount;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub rows: Vec<CanonicalRow>,
    pub warnings: Vec<Warning>,
}

/// Collects canonical rows, summing duplicates of the same
/// (salesperson, client, period) in first-seen order.
#[derive(Default)]
struct Merger {
    index: HashMap<(String, String, PeriodKey), usize>,
    rows: Vec<CanonicalRow>,
    merged: usize,
}

impl Merger {
    /// Fails, leaving the merged row untouched, when the sum would overflow.
    fn add(
        &mut self,
        salesperson: &str,
        client: &str,
        period: PeriodKey,
        revenue: Decimal,
    ) -> Result<(), SkipReason> {
        let key = (salesperson.to_string(), client.to_string(), period);
        if let Some(&pos) = self.index.get(&key) {
            let merged = &mut self.rows[pos].gross_revenue;
            *merged = merged
                .checked_add(revenue)
                .ok_or(SkipReason::RevenueOverflow(revenue))?;
            self.merged += 1;
            return Ok(());
        }
        self.rows.push(CanonicalRow {
            salesperson: key.0.clone(),
            client: key.1.clone(),
            period: key.2.clone(),
            gross_revenue: revenue,
        });
        self.index.insert(key, self.rows.len() - 1);
        Ok(())
    }
}

/// Convert sheet rows into canonical rows using a detected mapping.
///
/// Rows are produced in source row order; wide rows expand one canonical
/// row per period column in chronological order. The salesperson column is
/// forward-filled so merged cells spanning several clients still resolve.
pub fn normalize_rows(sheet: &RawSheet, mapping: &ColumnMapping) -> Normalized {
    let mut merger = Merger::default();
    let mut warnings = Vec::new();
    let mut last_salesperson: Option<String> = None;

    for (r, row) in sheet.rows.iter().enumerate() {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let sheet_row = RawSheet::sheet_row_number(r);

        let salesperson_cell = sheet.cell(r, mapping.salesperson_col()).trim();
        if !salesperson_cell.is_empty() {
            last_salesperson = Some(salesperson_cell.to_string());
        }
        let Some(salesperson) = last_salesperson.clone() else {
            warnings.push(Warning::RowSkipped {
                row: sheet_row,
                column: None,
                reason: SkipReason::MissingSalesperson,
            });
            continue;
        };
        let client = sheet.cell(r, mapping.client_col()).trim();
        if client.is_empty() {
            warnings.push(Warning::RowSkipped {
                row: sheet_row,
                column: None,
                reason: SkipReason::MissingClient,
            });
            continue;
        }

        match mapping {
            ColumnMapping::Long {
                period, revenue, ..
            } => {
                let label = sheet.cell(r, *period);
                let key = parse_period(label);
                let amount = match parse_amount(sheet.cell(r, *revenue)) {
                    Ok(Some(v)) => v,
                    Ok(None) => {
                        warnings.push(Warning::RowSkipped {
                            row: sheet_row,
                            column: None,
                            reason: SkipReason::MissingRevenue,
                        });
                        continue;
                    }
                    Err(reason) => {
                        warnings.push(Warning::RowSkipped {
                            row: sheet_row,
                            column: None,
                            reason,
                        });
                        continue;
                    }
                };
                if !key.is_valid() {
                    warnings.push(Warning::UnparseablePeriod {
                        row: sheet_row,
                        label: label.trim().to_string(),
                    });
                }
                if let Err(reason) = merger.add(&salesperson, client, key, amount) {
                    warnings.push(Warning::RowSkipped {
                        row: sheet_row,
                        column: None,
                        reason,
                    });
                }
            }
            ColumnMapping::Wide { periods, .. } => {
                for (key, col) in periods {
                    let added = parse_amount(sheet.cell(r, *col)).and_then(|v| {
                        merger.add(&salesperson, client, key.clone(), v.unwrap_or_default())
                    });
                    if let Err(reason) = added {
                        warnings.push(Warning::RowSkipped {
                            row: sheet_row,
                            column: sheet.headers.get(*col).cloned(),
                            reason,
                        });
                    }
                }
            }
        }
    }

    if merger.merged > 0 {
        debug!("{} duplicate rows merged by summation", merger.merged);
    }
    info!(
        "normalized {} canonical rows ({} warnings)",
        merger.rows.len(),
        warnings.len()
    );
    Normalized {
        rows: merger.rows,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sheet(headers: &[&str], rows: &[&[&str]]) -> RawSheet {
        RawSheet::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn long_mapping() -> ColumnMapping {
        ColumnMapping::Long {
            salesperson: 0,
            client: 1,
            period: 2,
            revenue: 3,
        }
    }

    #[test]
    fn duplicate_long_rows_are_summed() {
        let s = sheet(
            &["Comercial", "Cliente", "Mes", "Facturación"],
            &[
                &["Ana", "ClienteX", "enero 2025", "300"],
                &["Ana", "ClienteX", "Enero 2025", "200"],
            ],
        );
        let out = normalize_rows(&s, &long_mapping());
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].gross_revenue, dec!(500));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn bad_revenue_rows_are_skipped_with_row_numbers() {
        let s = sheet(
            &["Comercial", "Cliente", "Mes", "Facturación"],
            &[
                &["Ana", "A", "enero 2025", "abc"],
                &["Ana", "B", "enero 2025", ""],
                &["Ana", "C", "enero 2025", "10"],
            ],
        );
        let out = normalize_rows(&s, &long_mapping());
        assert_eq!(out.rows.len(), 1);
        assert_eq!(
            out.warnings,
            vec![
                Warning::RowSkipped {
                    row: 2,
                    column: None,
                    reason: SkipReason::NonNumericRevenue("abc".into())
                },
                Warning::RowSkipped {
                    row: 3,
                    column: None,
                    reason: SkipReason::MissingRevenue
                },
            ]
        );
    }

    #[test]
    fn unparseable_periods_are_kept_and_flagged() {
        let s = sheet(
            &["Comercial", "Cliente", "Mes", "Facturación"],
            &[&["Ana", "A", "Q1", "10"]],
        );
        let out = normalize_rows(&s, &long_mapping());
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].period, PeriodKey::Unparseable("Q1".into()));
        assert_eq!(
            out.warnings,
            vec![Warning::UnparseablePeriod {
                row: 2,
                label: "Q1".into()
            }]
        );
    }

    #[test]
    fn salesperson_is_forward_filled() {
        let s = sheet(
            &["Comercial", "Cliente", "Mes", "Facturación"],
            &[
                &["Ana", "A", "enero 2025", "10"],
                &["", "B", "enero 2025", "20"],
                &["Luis", "C", "enero 2025", "30"],
            ],
        );
        let out = normalize_rows(&s, &long_mapping());
        let names: Vec<&str> = out.rows.iter().map(|r| r.salesperson.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Ana", "Luis"]);
    }

    #[test]
    fn wide_rows_explode_with_zero_for_blank_cells() {
        let s = sheet(
            &["Comercial", "Cliente", "Enero 2025", "Febrero 2025"],
            &[&["Ana", "A", "100", ""], &["Ana", "B", "0", "1.250,50"]],
        );
        let mapping = ColumnMapping::Wide {
            salesperson: 0,
            client: 1,
            periods: vec![(parse_period("Enero 2025"), 2), (parse_period("Febrero 2025"), 3)],
        };
        let out = normalize_rows(&s, &mapping);
        let got: Vec<(String, String, Decimal)> = out
            .rows
            .iter()
            .map(|r| (r.client.clone(), r.period.to_string(), r.gross_revenue))
            .collect();
        assert_eq!(
            got,
            vec![
                ("A".into(), "enero 2025".into(), dec!(100)),
                ("A".into(), "febrero 2025".into(), dec!(0)),
                ("B".into(), "enero 2025".into(), dec!(0)),
                ("B".into(), "febrero 2025".into(), dec!(1250.50)),
            ]
        );
    }

    #[test]
    fn malformed_wide_cells_are_reported_with_column() {
        let s = sheet(
            &["Comercial", "Cliente", "Enero 2025"],
            &[&["Ana", "A", "n/d"]],
        );
        let mapping = ColumnMapping::Wide {
            salesperson: 0,
            client: 1,
            periods: vec![(parse_period("Enero 2025"), 2)],
        };
        let out = normalize_rows(&s, &mapping);
        assert!(out.rows.is_empty());
        assert_eq!(
            out.warnings,
            vec![Warning::RowSkipped {
                row: 2,
                column: Some("Enero 2025".into()),
                reason: SkipReason::NonNumericRevenue("n/d".into())
            }]
        );
    }

    #[test]
    fn merge_overflow_skips_the_later_row() {
        let s = sheet(
            &["Comercial", "Cliente", "Mes", "Facturación"],
            &[
                &["Ana", "A", "enero 2025", "5e28"],
                &["Ana", "A", "enero 2025", "5e28"],
            ],
        );
        let out = normalize_rows(&s, &long_mapping());
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].gross_revenue, Decimal::from_scientific("5e28").unwrap());
        assert!(matches!(
            out.warnings.as_slice(),
            [Warning::RowSkipped {
                row: 3,
                reason: SkipReason::RevenueOverflow(_),
                ..
            }]
        ));
    }
}
