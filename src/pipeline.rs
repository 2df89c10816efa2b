//! Inspection and analysis contracts over a decoded sheet.
//!
//! `Pipeline::prepare` runs detection and normalization once per sheet;
//! the resulting [`Prepared`] snapshot is then analyzed as many times as
//! the rate or filters change, each time from scratch.
use crate::commission::{apply_commission, totals, validate_rate};
use crate::config::{MappingOverride, SynonymTable};
use crate::detect::{detect_format, resolve_override};
use crate::error::{CommissionError, Result};
use crate::normalize::normalize_rows;
use crate::reports::{
    client_ranking, comparison_pair, drop_alerts, filter_rows, goal_attainment,
    grouped_by_salesperson, period_comparison, salesperson_distribution, time_series,
    AnalysisFilter,
};
use crate::types::{
    CanonicalRow, ClientRank, ColumnMapping, CommissionRow, DropAlert, GoalAttainment,
    PeriodComparison, PeriodTotals, RawSheet, SalespersonGroup, SalespersonShare, SheetFormat,
    Totals, Warning,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    synonyms: SynonymTable,
    mapping_override: Option<MappingOverride>,
}

impl Pipeline {
    pub fn new(synonyms: SynonymTable) -> Self {
        Self {
            synonyms,
            mapping_override: None,
        }
    }

    pub fn with_override(mut self, mapping: Option<MappingOverride>) -> Self {
        self.mapping_override = mapping;
        self
    }

    /// Detect the layout and normalize rows. Structural failures abort here,
    /// before any commission is computed.
    pub fn prepare(&self, sheet: &RawSheet) -> Result<Prepared> {
        if sheet.headers.iter().all(|h| h.trim().is_empty()) {
            return Err(CommissionError::EmptySheet);
        }
        let mapping = match &self.mapping_override {
            Some(saved) => resolve_override(&sheet.headers, saved)?,
            None => detect_format(&sheet.headers, &self.synonyms)?,
        };
        let normalized = normalize_rows(sheet, &mapping);
        if !normalized.warnings.is_empty() {
            warn!(
                "{} rows produced warnings during normalization",
                normalized.warnings.len()
            );
        }
        Ok(Prepared {
            format: mapping.format(),
            columns: sheet.headers.clone(),
            mapping,
            rows: normalized.rows,
            warnings: normalized.warnings,
        })
    }

    pub fn inspect(&self, sheet: &RawSheet) -> Result<Inspection> {
        Ok(self.prepare(sheet)?.inspection())
    }

    pub fn analyze(&self, sheet: &RawSheet, request: &AnalysisRequest) -> Result<Analysis> {
        self.prepare(sheet)?.analyze(request)
    }
}

/// Detected layout plus canonical rows of one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub format: SheetFormat,
    /// Header row of the source sheet.
    pub columns: Vec<String>,
    pub mapping: ColumnMapping,
    pub rows: Vec<CanonicalRow>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspection {
    pub format: SheetFormat,
    pub columns: Vec<String>,
    /// The mapping in effect, by header name, ready to be edited and
    /// passed back as an override.
    pub mapping: MappingOverride,
    pub available_salespersons: BTreeSet<String>,
    /// Chronological, unparseable labels last.
    pub available_periods: Vec<String>,
    pub row_count: usize,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub rate: Decimal,
    pub filter: AnalysisFilter,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            rate: Decimal::from(5),
            filter: AnalysisFilter::default(),
        }
    }
}

/// Filtered commission rows and their grand totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub rate: Decimal,
    #[serde(skip)]
    pub filter: AnalysisFilter,
    pub totals: Totals,
    pub rows: Vec<CommissionRow>,
    pub warnings: Vec<Warning>,
}

impl Prepared {
    pub fn inspection(&self) -> Inspection {
        let available_salespersons = self.rows.iter().map(|r| r.salesperson.clone()).collect();
        let periods: BTreeSet<_> = self.rows.iter().map(|r| r.period.clone()).collect();
        Inspection {
            format: self.format,
            columns: self.columns.clone(),
            mapping: MappingOverride::from_mapping(&self.mapping, &self.columns),
            available_salespersons,
            available_periods: periods.iter().map(|p| p.to_string()).collect(),
            row_count: self.rows.len(),
            warnings: self.warnings.clone(),
        }
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis> {
        validate_rate(request.rate)?;
        let all = apply_commission(&self.rows, request.rate)?;
        let rows = filter_rows(&all, &request.filter);
        let totals = totals(&rows)?;
        info!(
            "analysis at {}%: {} rows, revenue {}, commission {}",
            request.rate, totals.row_count, totals.total_revenue, totals.total_commission
        );
        Ok(Analysis {
            rate: request.rate,
            filter: request.filter.clone(),
            totals,
            rows,
            warnings: self.warnings.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOptions {
    pub goals: HashMap<String, Decimal>,
    pub top_n: Option<usize>,
}

/// Immutable snapshot of every derived view for one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub rate: Decimal,
    pub totals: Totals,
    pub time_series: Vec<PeriodTotals>,
    pub distribution: Vec<SalespersonShare>,
    pub ranking: Vec<ClientRank>,
    pub grouped: Vec<SalespersonGroup>,
    pub comparison: Option<PeriodComparison>,
    pub alerts: Vec<DropAlert>,
    pub goals: Vec<GoalAttainment>,
    pub warnings: Vec<Warning>,
    /// The filtered rows every view was derived from, for export.
    #[serde(skip)]
    pub rows: Vec<CommissionRow>,
}

impl AnalysisResult {
    pub fn compute(analysis: &Analysis, options: &ViewOptions) -> Self {
        let rows = &analysis.rows;
        let series = time_series(rows);
        let distribution = salesperson_distribution(rows);
        let selected = &analysis.filter.periods;
        let alerts = comparison_pair(&series, selected)
            .map(|pair| drop_alerts(rows, &pair))
            .unwrap_or_default();
        Self {
            rate: analysis.rate,
            totals: analysis.totals,
            comparison: period_comparison(&series, selected),
            ranking: client_ranking(rows, options.top_n),
            grouped: grouped_by_salesperson(rows),
            goals: goal_attainment(&distribution, &options.goals),
            time_series: series,
            distribution,
            alerts,
            warnings: analysis.warnings.clone(),
            rows: rows.clone(),
        }
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

    #[test]
    fn inspection_lists_options() {
        let s = sheet(
            &["Comercial", "Cliente", "Marzo 2025", "Enero 2025"],
            &[&["Luis", "A", "1", "2"], &["Ana", "B", "3", ""]],
        );
        let inspection = Pipeline::default().inspect(&s).unwrap();
        assert_eq!(inspection.format, SheetFormat::Wide);
        assert_eq!(
            inspection.available_salespersons.into_iter().collect::<Vec<_>>(),
            vec!["Ana".to_string(), "Luis".to_string()]
        );
        assert_eq!(inspection.available_periods, vec!["enero 2025", "marzo 2025"]);
        assert_eq!(inspection.row_count, 4);
    }

    #[test]
    fn empty_header_is_an_error() {
        let s = sheet(&[""], &[]);
        assert!(matches!(
            Pipeline::default().prepare(&s),
            Err(CommissionError::EmptySheet)
        ));
    }

    #[test]
    fn analysis_applies_rate_and_filters() {
        let s = sheet(
            &["Comercial", "Cliente", "Mes", "Importe"],
            &[
                &["Ana", "X", "enero 2025", "1000"],
                &["Luis", "Y", "enero 2025", "500"],
            ],
        );
        let request = AnalysisRequest {
            rate: dec!(5),
            filter: AnalysisFilter {
                salespersons: vec!["Ana".into()],
                periods: vec![],
            },
        };
        let analysis = Pipeline::default().analyze(&s, &request).unwrap();
        assert_eq!(analysis.totals.row_count, 1);
        assert_eq!(analysis.totals.total_commission, dec!(50.00));
    }

    #[test]
    fn structural_errors_abort_before_commission() {
        let s = sheet(&["Foo", "Bar"], &[&["1", "2"]]);
        assert!(matches!(
            Pipeline::default().analyze(&s, &AnalysisRequest::default()),
            Err(CommissionError::FormatDetection { .. })
        ));
    }

    #[test]
    fn saved_mapping_replaces_detection() {
        let s = sheet(
            &["Vend", "Cta", "Periodo fiscal", "Neto"],
            &[&["Ana", "X", "enero 2025", "10"]],
        );
        let pipeline = Pipeline::default().with_override(Some(MappingOverride {
            format: SheetFormat::Long,
            comercial: "Vend".into(),
            cliente: "Cta".into(),
            mes: Some("Periodo fiscal".into()),
            facturacion: Some("Neto".into()),
            period_columns: vec![],
        }));
        let prepared = pipeline.prepare(&s).unwrap();
        assert_eq!(prepared.rows.len(), 1);
        assert_eq!(prepared.rows[0].gross_revenue, dec!(10));
    }

    #[test]
    fn inspection_exposes_columns_and_active_mapping() {
        let s = sheet(
            &["Vendedor", "Cuenta", "Mes", "Ventas"],
            &[&["Ana", "X", "enero 2025", "10"]],
        );
        let inspection = Pipeline::default().inspect(&s).unwrap();
        assert_eq!(inspection.columns, vec!["Vendedor", "Cuenta", "Mes", "Ventas"]);
        assert_eq!(inspection.mapping.comercial, "Vendedor");
        assert_eq!(inspection.mapping.facturacion.as_deref(), Some("Ventas"));

        let reused = Pipeline::default()
            .with_override(Some(inspection.mapping))
            .prepare(&s)
            .unwrap();
        assert_eq!(reused.rows.len(), 1);
    }

    #[test]
    fn every_inspected_period_selects_its_rows() {
        let s = sheet(
            &["Comercial", "Cliente", "Mes", "Importe"],
            &[
                &["Ana", "A", "", "100"],
                &["Ana", "B", "enero 2025", "50"],
                &["Luis", "C", "trimestre 1", "20"],
            ],
        );
        let prepared = Pipeline::default().prepare(&s).unwrap();
        let inspection = prepared.inspection();
        assert_eq!(
            inspection.available_periods,
            vec!["enero 2025", "sin fecha", "trimestre 1"]
        );
        for period in &inspection.available_periods {
            let request = AnalysisRequest {
                rate: dec!(5),
                filter: AnalysisFilter {
                    salespersons: vec![],
                    periods: vec![period.clone()],
                },
            };
            let analysis = prepared.analyze(&request).unwrap();
            assert_eq!(analysis.totals.row_count, 1, "period {period}");
        }
    }

    #[test]
    fn overflowing_rate_is_an_error() {
        let s = sheet(
            &["Comercial", "Cliente", "Mes", "Importe"],
            &[&["Ana", "X", "enero 2025", "1000"]],
        );
        let request = AnalysisRequest {
            rate: Decimal::MAX,
            filter: AnalysisFilter::default(),
        };
        assert!(matches!(
            Pipeline::default().analyze(&s, &request),
            Err(CommissionError::Overflow(_))
        ));
    }
}
