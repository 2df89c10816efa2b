// Structural layout detection: long (one row per client-period) or wide
// (one row per client, one column per period).
use crate::config::{MappingOverride, SynonymTable};
use crate::error::{CommissionError, Result};
use crate::period::{parse_period, PeriodKey};
use crate::types::{CanonicalField, ColumnMapping, SheetFormat};
use crate::util::normalize_text;
use tracing::{debug, info};

const PERIOD_COLUMN: &str = "columna de periodo (p. ej. 'enero 2025')";

struct HeaderIndex<'a> {
    raw: &'a [String],
    normalized: Vec<String>,
}

impl<'a> HeaderIndex<'a> {
    fn new(raw: &'a [String]) -> Self {
        let normalized = raw.iter().map(|h| normalize_text(h)).collect();
        Self { raw, normalized }
    }

    fn columns_for(&self, synonyms: &SynonymTable, field: CanonicalField) -> Vec<usize> {
        self.normalized
            .iter()
            .enumerate()
            .filter(|(_, h)| synonyms.matches(field, h))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Exactly one column or a `MappingAmbiguity` error; `None` when absent.
    fn unique(&self, field: CanonicalField, cols: &[usize]) -> Result<Option<usize>> {
        match cols {
            [] => Ok(None),
            [idx] => Ok(Some(*idx)),
            many => Err(CommissionError::MappingAmbiguity {
                field: field.name().to_string(),
                columns: many.iter().map(|i| self.raw[*i].clone()).collect(),
            }),
        }
    }

    fn period_columns(&self, exclude: &[usize]) -> Vec<(PeriodKey, usize)> {
        let mut periods: Vec<(PeriodKey, usize)> = self
            .raw
            .iter()
            .enumerate()
            .filter(|(idx, _)| !exclude.contains(idx))
            .map(|(idx, h)| (parse_period(h), idx))
            .filter(|(key, _)| key.is_valid())
            .collect();
        periods.sort();
        periods
    }
}

/// Decide the sheet layout from its header row.
///
/// Long format is tried first and wins whenever all four canonical columns
/// are present, even if some headers would also parse as periods.
pub fn detect_format(headers: &[String], synonyms: &SynonymTable) -> Result<ColumnMapping> {
    let index = HeaderIndex::new(headers);
    let found: Vec<(CanonicalField, Vec<usize>)> = CanonicalField::ALL
        .iter()
        .map(|f| (*f, index.columns_for(synonyms, *f)))
        .collect();

    let missing_long: Vec<CanonicalField> = found
        .iter()
        .filter(|(_, cols)| cols.is_empty())
        .map(|(f, _)| *f)
        .collect();

    if missing_long.is_empty() {
        let col = |field: CanonicalField| -> Result<usize> {
            let cols = &found[field as usize].1;
            Ok(index.unique(field, cols)?.unwrap_or_default())
        };
        let mapping = ColumnMapping::Long {
            salesperson: col(CanonicalField::Comercial)?,
            client: col(CanonicalField::Cliente)?,
            period: col(CanonicalField::Mes)?,
            revenue: col(CanonicalField::Facturacion)?,
        };
        info!("detected long format: {:?}", mapping);
        return Ok(mapping);
    }
    debug!("long format rejected, missing {:?}", missing_long);

    let salesperson = index.unique(
        CanonicalField::Comercial,
        &found[CanonicalField::Comercial as usize].1,
    )?;
    let client = index.unique(
        CanonicalField::Cliente,
        &found[CanonicalField::Cliente as usize].1,
    )?;
    let exclude: Vec<usize> = salesperson.iter().chain(client.iter()).copied().collect();
    let periods = index.period_columns(&exclude);

    match (salesperson, client) {
        (Some(salesperson), Some(client)) if !periods.is_empty() => {
            info!(
                "detected wide format with {} period columns",
                periods.len()
            );
            Ok(ColumnMapping::Wide {
                salesperson,
                client,
                periods,
            })
        }
        (salesperson, client) => {
            let mut missing_wide: Vec<&str> = Vec::new();
            if salesperson.is_none() {
                missing_wide.push(CanonicalField::Comercial.name());
            }
            if client.is_none() {
                missing_wide.push(CanonicalField::Cliente.name());
            }
            if periods.is_empty() {
                missing_wide.push(PERIOD_COLUMN);
            }
            let long_names: Vec<&str> = missing_long.iter().map(|f| f.name()).collect();
            Err(CommissionError::FormatDetection {
                missing: vec![
                    format!("formato long: {}", long_names.join(", ")),
                    format!("formato wide: {}", missing_wide.join(", ")),
                ],
            })
        }
    }
}

/// Resolve a saved header-name mapping against this sheet's headers.
pub fn resolve_override(headers: &[String], mapping: &MappingOverride) -> Result<ColumnMapping> {
    let index = HeaderIndex::new(headers);
    let find = |name: &str| -> Result<usize> {
        let wanted = normalize_text(name);
        let cols: Vec<usize> = index
            .normalized
            .iter()
            .enumerate()
            .filter(|(_, h)| **h == wanted)
            .map(|(idx, _)| idx)
            .collect();
        match cols.as_slice() {
            [idx] => Ok(*idx),
            [] => Err(CommissionError::MappingOverride(format!(
                "column '{}' not found",
                name
            ))),
            _ => Err(CommissionError::MappingOverride(format!(
                "column '{}' appears {} times",
                name,
                cols.len()
            ))),
        }
    };
    let required = |name: &Option<String>, field: CanonicalField| -> Result<usize> {
        match name {
            Some(n) => find(n),
            None => Err(CommissionError::MappingOverride(format!(
                "long format needs a '{}' column",
                field
            ))),
        }
    };

    let salesperson = find(&mapping.comercial)?;
    let client = find(&mapping.cliente)?;
    let resolved = match mapping.format {
        SheetFormat::Long => ColumnMapping::Long {
            salesperson,
            client,
            period: required(&mapping.mes, CanonicalField::Mes)?,
            revenue: required(&mapping.facturacion, CanonicalField::Facturacion)?,
        },
        SheetFormat::Wide => {
            if mapping.period_columns.is_empty() {
                return Err(CommissionError::MappingOverride(
                    "wide format needs at least one period column".to_string(),
                ));
            }
            let mut periods = Vec::with_capacity(mapping.period_columns.len());
            for name in &mapping.period_columns {
                let idx = find(name)?;
                let key = parse_period(&headers[idx]);
                if !key.is_valid() {
                    return Err(CommissionError::MappingOverride(format!(
                        "column '{}' is not a period",
                        name
                    )));
                }
                periods.push((key, idx));
            }
            periods.sort();
            ColumnMapping::Wide {
                salesperson,
                client,
                periods,
            }
        }
    };
    info!("using saved {} mapping", resolved.format());
    Ok(resolved)
}
