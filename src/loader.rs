use crate::error::{CommissionError, Result};
use crate::types::RawSheet;
use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, info};

const EXCEL_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// Decode a `.csv` or workbook file into a `RawSheet`.
///
/// Workbooks use `sheet` when given, otherwise the first worksheet. The
/// first non-empty row is the header row in both cases.
pub fn load_sheet(path: impl AsRef<Path>, sheet: Option<&str>) -> Result<RawSheet> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let raw = if ext == "csv" {
        read_csv_rows(path)?
    } else if EXCEL_EXTENSIONS.contains(&ext.as_str()) {
        read_workbook_rows(path, sheet)?
    } else {
        return Err(CommissionError::UnsupportedFile(path.display().to_string()));
    };
    let sheet = sheet_from_rows(raw)?;
    info!(
        "loaded {} ({} columns, {} data rows)",
        path.display(),
        sheet.headers.len(),
        sheet.rows.len()
    );
    Ok(sheet)
}

/// `;` when the opening lines have more semicolons than commas, else `,`.
fn sniff_delimiter(text: &str) -> u8 {
    let head: Vec<&str> = text.lines().take(5).collect();
    let semis: usize = head.iter().map(|l| l.matches(';').count()).sum();
    let commas: usize = head.iter().map(|l| l.matches(',').count()).sum();
    if semis > commas {
        b';'
    } else {
        b','
    }
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let text = text.trim_start_matches('\u{feff}');
    let delimiter = sniff_delimiter(text);
    debug!("csv delimiter '{}'", delimiter as char);

    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }
    Ok(rows)
}

fn read_workbook_rows(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)?;
    let name = match sheet {
        Some(s) => s.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(CommissionError::EmptySheet)?,
    };
    debug!("reading worksheet '{}'", name);
    let range = workbook.worksheet_range(&name)?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_text).collect())
        .collect())
}

fn cell_to_text(c: &Data) -> String {
    match c {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::DateTime(_) => c
            .as_date()
            .map(|d: NaiveDate| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| c.to_string()),
        Data::DateTimeIso(s) => s.clone(),
        other => other.to_string(),
    }
}

/// First non-empty row becomes the header; trailing empty rows are dropped
/// and short rows are padded to the header width.
fn sheet_from_rows(raw: Vec<Vec<String>>) -> Result<RawSheet> {
    let is_blank = |row: &Vec<String>| row.iter().all(|c| c.trim().is_empty());
    let mut rows = raw.into_iter().skip_while(|r| is_blank(r));
    let headers: Vec<String> = rows.next().ok_or(CommissionError::EmptySheet)?;
    let mut data: Vec<Vec<String>> = rows.collect();
    while data.last().map(|r| is_blank(r)).unwrap_or(false) {
        data.pop();
    }
    for row in &mut data {
        if row.len() < headers.len() {
            row.resize(headers.len(), String::new());
        }
    }
    Ok(RawSheet::new(headers, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semicolon_csv_with_bom_and_preamble() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ventas.csv");
        std::fs::write(
            &path,
            "\u{feff};;\nComercial;Cliente;Mes;Importe\nAna;X;enero 2025;1.000,50\nLuis;Y\n;;;\n",
        )
        .unwrap();
        let sheet = load_sheet(&path, None).unwrap();
        assert_eq!(sheet.headers, vec!["Comercial", "Cliente", "Mes", "Importe"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][3], "1.000,50");
        assert_eq!(sheet.rows[1], vec!["Luis", "Y", "", ""]);
    }

    #[test]
    fn comma_csv_is_sniffed() {
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3;x"), b',');
        assert_eq!(sniff_delimiter("a;b;c"), b';');
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        assert!(matches!(
            load_sheet("ventas.pdf", None),
            Err(CommissionError::UnsupportedFile(_))
        ));
    }

    #[test]
    fn blank_file_has_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.csv");
        std::fs::write(&path, "\n").unwrap();
        assert!(matches!(
            load_sheet(&path, None),
            Err(CommissionError::EmptySheet)
        ));
    }

    #[test]
    fn cells_convert_to_text() {
        assert_eq!(cell_to_text(&Data::Float(1000.0)), "1000");
        assert_eq!(cell_to_text(&Data::Float(12.5)), "12.5");
        assert_eq!(cell_to_text(&Data::Int(7)), "7");
        assert_eq!(cell_to_text(&Data::String("  Ana ".into())), "Ana");
        assert_eq!(cell_to_text(&Data::Empty), "");
    }
}
