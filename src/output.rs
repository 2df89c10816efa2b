use crate::error::Result;
use crate::pipeline::AnalysisResult;
use crate::types::CommissionRow;
use crate::util::{decimal_comma, format_money, format_pct};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use std::io::Write;
use tabled::{settings::Style, Table, Tabled};

const EXPORT_HEADER: [&str; 5] = [
    "Comercial",
    "Cliente",
    "Mes",
    "Facturación bruta",
    "Comisión (€)",
];
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Semicolon-separated, fully quoted, decimal-comma export with a UTF-8 BOM
/// so spreadsheet apps in Spanish locales open it directly. Amounts are the
/// computed values, only rendered with two decimals.
pub fn export_rows<W: Write>(mut out: W, rows: &[CommissionRow]) -> Result<()> {
    out.write_all(UTF8_BOM)?;
    let mut wtr = WriterBuilder::new()
        .delimiter(b';')
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .from_writer(out);
    wtr.write_record(EXPORT_HEADER)?;
    for r in rows {
        wtr.write_record([
            r.salesperson.clone(),
            r.client.clone(),
            r.period.to_string(),
            decimal_comma(r.gross_revenue),
            decimal_comma(r.commission_amount),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_export_csv(path: &str, rows: &[CommissionRow]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    export_rows(file, rows)
}

pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(sin datos)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Print every view of an analysis as markdown tables.
pub fn print_analysis(result: &AnalysisResult, max_rows: usize) {
    println!(
        "Comisión {}% | Facturación {} € | Comisión {} € | {} registros\n",
        result.rate,
        format_money(result.totals.total_revenue),
        format_money(result.totals.total_commission),
        result.totals.row_count
    );

    println!("Evolución mensual");
    preview_table_rows(&result.time_series, max_rows);

    println!("Reparto por comercial");
    preview_table_rows(&result.distribution, max_rows);

    println!("Top clientes");
    preview_table_rows(&result.ranking, max_rows);

    println!("Detalle por comercial");
    for group in result.grouped.iter().take(max_rows) {
        println!(
            "{} ({} €)",
            group.salesperson,
            format_money(group.commission)
        );
        preview_table_rows(&group.clients, max_rows);
    }

    match &result.comparison {
        Some(cmp) => println!(
            "Comparativa {} → {}: {} € ({})\n",
            cmp.previous.period,
            cmp.current.period,
            format_money(cmp.delta),
            format_pct(cmp.pct)
        ),
        None => println!("Comparativa: se necesitan al menos dos meses\n"),
    }

    println!("Alertas de caída");
    preview_table_rows(&result.alerts, max_rows);

    println!("Objetivos");
    preview_table_rows(&result.goals, max_rows);

    if !result.warnings.is_empty() {
        println!("Avisos: {}", result.warnings.len());
        for w in result.warnings.iter().take(max_rows) {
            println!("  - {}", w);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::parse_period;
    use rust_decimal_macros::dec;

    #[test]
    fn export_uses_semicolons_quotes_bom_and_decimal_comma() {
        let rows = vec![CommissionRow {
            salesperson: "Ana".into(),
            client: "Cliente; \"X\"".into(),
            period: parse_period("enero 2025"),
            gross_revenue: dec!(1000),
            commission_amount: dec!(50),
        }];
        let mut buf = Vec::new();
        export_rows(&mut buf, &rows).unwrap();
        assert!(buf.starts_with(UTF8_BOM));
        let text = String::from_utf8(buf[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(
            lines[0],
            "\"Comercial\";\"Cliente\";\"Mes\";\"Facturación bruta\";\"Comisión (€)\""
        );
        assert_eq!(
            lines[1],
            "\"Ana\";\"Cliente; \"\"X\"\"\";\"enero 2025\";\"1000,00\";\"50,00\""
        );
    }

    #[test]
    fn json_summary_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let path = path.to_str().unwrap();
        write_json(path, &serde_json::json!({"total": "50.00"})).unwrap();
        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back["total"], "50.00");
    }
}
