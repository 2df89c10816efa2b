// Header synonym table, saved column mappings and salesperson goals.
use crate::error::Result;
use crate::types::{CanonicalField, ColumnMapping, SheetFormat};
use crate::util::normalize_text;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

const DEFAULT_SYNONYMS: [(CanonicalField, &[&str]); 4] = [
    (
        CanonicalField::Comercial,
        &[
            "comercial",
            "nombre comercial",
            "vendedor",
            "agente",
            "salesperson",
            "asesor",
            "gestor",
        ],
    ),
    (
        CanonicalField::Cliente,
        &[
            "cliente",
            "nombre cliente",
            "cuenta",
            "customer",
            "razon social",
            "empresa",
            "destinatario",
        ],
    ),
    (CanonicalField::Mes, &["mes", "month", "periodo"]),
    (
        CanonicalField::Facturacion,
        &[
            "facturacion bruta",
            "facturacion",
            "ventas",
            "importe",
            "total",
            "revenue",
        ],
    ),
];

/// Accepted header names per canonical field, stored normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynonymTable {
    entries: BTreeMap<CanonicalField, Vec<String>>,
}

impl Default for SynonymTable {
    fn default() -> Self {
        let entries = DEFAULT_SYNONYMS
            .iter()
            .map(|(field, names)| (*field, names.iter().map(|n| n.to_string()).collect()))
            .collect();
        Self { entries }
    }
}

impl SynonymTable {
    /// Built-in names extended with the entries of a JSON file shaped like
    /// `{"comercial": ["delegado"], "facturacion": ["neto"]}`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let extra: BTreeMap<CanonicalField, Vec<String>> = serde_json::from_str(&text)?;
        let mut table = Self::default();
        for (field, names) in extra {
            table.extend(field, names);
        }
        Ok(table)
    }

    pub fn extend<I, S>(&mut self, field: CanonicalField, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.entries.entry(field).or_default();
        for name in names {
            let norm = normalize_text(name.as_ref());
            if !norm.is_empty() && !entry.contains(&norm) {
                debug!("synonym '{}' added for {}", norm, field);
                entry.push(norm);
            }
        }
    }

    /// `normalized_header` must already be passed through `normalize_text`.
    pub fn matches(&self, field: CanonicalField, normalized_header: &str) -> bool {
        self.entries
            .get(&field)
            .map(|names| names.iter().any(|n| n == normalized_header))
            .unwrap_or(false)
    }

    pub fn names(&self, field: CanonicalField) -> &[String] {
        self.entries.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Explicit header-name mapping saved by the user; replaces detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingOverride {
    pub format: SheetFormat,
    pub comercial: String,
    pub cliente: String,
    #[serde(default)]
    pub mes: Option<String>,
    #[serde(default)]
    pub facturacion: Option<String>,
    #[serde(default)]
    pub period_columns: Vec<String>,
}

impl MappingOverride {
    /// Header names of a resolved mapping, ready to be saved and reused on
    /// sheets with the same headers.
    pub fn from_mapping(mapping: &ColumnMapping, headers: &[String]) -> Self {
        let name = |idx: usize| headers.get(idx).cloned().unwrap_or_default();
        match mapping {
            ColumnMapping::Long {
                salesperson,
                client,
                period,
                revenue,
            } => Self {
                format: SheetFormat::Long,
                comercial: name(*salesperson),
                cliente: name(*client),
                mes: Some(name(*period)),
                facturacion: Some(name(*revenue)),
                period_columns: Vec::new(),
            },
            ColumnMapping::Wide {
                salesperson,
                client,
                periods,
            } => Self {
                format: SheetFormat::Wide,
                comercial: name(*salesperson),
                cliente: name(*client),
                mes: None,
                facturacion: None,
                period_columns: periods.iter().map(|(_, idx)| name(*idx)).collect(),
            },
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let s = serde_json::to_string_pretty(self)?;
        std::fs::write(path, s)?;
        Ok(())
    }
}

/// Salesperson goals from a JSON object such as `{"Ana": 900, "Luis": "1200.50"}`.
pub fn load_goals(path: impl AsRef<Path>) -> Result<HashMap<String, Decimal>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_known_headers() {
        let table = SynonymTable::default();
        assert!(table.matches(CanonicalField::Comercial, "nombre comercial"));
        assert!(table.matches(CanonicalField::Cliente, "razon social"));
        assert!(table.matches(CanonicalField::Mes, "mes"));
        assert!(table.matches(CanonicalField::Facturacion, "facturacion bruta"));
        assert!(!table.matches(CanonicalField::Cliente, "comercial"));
    }

    #[test]
    fn extend_normalizes_names() {
        let mut table = SynonymTable::default();
        table.extend(CanonicalField::Comercial, ["  Delegado  Zona "]);
        assert!(table.matches(CanonicalField::Comercial, "delegado zona"));
        let before = table.names(CanonicalField::Comercial).len();
        table.extend(CanonicalField::Comercial, ["DELEGADO ZONA"]);
        assert_eq!(table.names(CanonicalField::Comercial).len(), before);
    }

    #[test]
    fn synonym_file_extends_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synonyms.json");
        std::fs::write(&path, r#"{"facturacion": ["Neto €"]}"#).unwrap();
        let table = SynonymTable::load(&path).unwrap();
        assert!(table.matches(CanonicalField::Facturacion, "neto €"));
        assert!(table.matches(CanonicalField::Facturacion, "ventas"));
    }

    #[test]
    fn mapping_override_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        let mapping = MappingOverride {
            format: SheetFormat::Wide,
            comercial: "Vendedor".into(),
            cliente: "Cuenta".into(),
            mes: None,
            facturacion: None,
            period_columns: vec!["Enero 2025".into()],
        };
        mapping.save(&path).unwrap();
        assert_eq!(MappingOverride::load(&path).unwrap(), mapping);
    }

    #[test]
    fn mapping_override_from_long_mapping() {
        let headers: Vec<String> = ["Vendedor", "Cuenta", "Mes", "Ventas"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mapping = ColumnMapping::Long {
            salesperson: 0,
            client: 1,
            period: 2,
            revenue: 3,
        };
        let saved = MappingOverride::from_mapping(&mapping, &headers);
        assert_eq!(saved.format, SheetFormat::Long);
        assert_eq!(saved.comercial, "Vendedor");
        assert_eq!(saved.facturacion.as_deref(), Some("Ventas"));
    }

    #[test]
    fn goals_accept_numbers_and_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("goals.json");
        std::fs::write(&path, r#"{"Ana": 900, "Luis": "1200.50"}"#).unwrap();
        let goals = load_goals(&path).unwrap();
        assert_eq!(goals["Ana"], Decimal::from(900));
        assert_eq!(goals["Luis"], Decimal::new(120050, 2));
    }
}
