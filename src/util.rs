// Utility helpers for text normalization, amount parsing and formatting.
//
// This module centralizes all the "dirty" spreadsheet handling so the rest
// of the code can assume clean, typed values.
use crate::types::SkipReason;
use num_format::{Locale, ToFormattedString};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Fold the accented latin letters that show up in Spanish and Catalan
/// headers to their plain ASCII base letter.
fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        _ => c,
    }
}

/// Lowercase, strip diacritics and collapse runs of whitespace to a single
/// space. Used for header matching, period labels and filter membership.
pub fn normalize_text(s: &str) -> String {
    let folded: String = s.to_lowercase().chars().map(fold_accent).collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a revenue cell into a non-negative `Decimal`.
///
/// - `Ok(None)` for blank cells and the usual null spellings.
/// - Strips `€` and any whitespace (including non-breaking spaces).
/// - When both `,` and `.` appear, the later one is the decimal separator.
/// - A lone `,` is a decimal comma.
pub fn parse_amount(raw: &str) -> Result<Option<Decimal>, SkipReason> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || matches!(normalize_text(trimmed).as_str(), "nan" | "none" | "null") {
        return Ok(None);
    }
    let mut s: String = trimmed
        .chars()
        .filter(|c| *c != '€' && !c.is_whitespace())
        .collect();
    match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => {
            s = s.replace('.', "").replace(',', ".");
        }
        (Some(_), Some(_)) => s = s.replace(',', ""),
        (Some(_), None) => s = s.replace(',', "."),
        _ => {}
    }
    let value = Decimal::from_str(&s)
        .or_else(|_| Decimal::from_scientific(&s))
        .map_err(|_| SkipReason::NonNumericRevenue(trimmed.to_string()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(SkipReason::NegativeRevenue(value));
    }
    Ok(Some(value))
}

/// Two-decimal monetary rounding, half away from zero.
pub fn round_money(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Fixed two-decimal rendering with a `.` separator, e.g. `1234.50`.
pub fn money_string(d: Decimal) -> String {
    let mut r = round_money(d);
    r.rescale(2);
    r.to_string()
}

/// Two decimals with a decimal comma and no grouping, e.g. `1234,50`.
/// This is the form the semicolon export uses.
pub fn decimal_comma(d: Decimal) -> String {
    money_string(d).replace('.', ",")
}

/// Money for console output: Spanish thousands grouping and decimal comma,
/// e.g. `1.234,50`.
pub fn format_money(d: Decimal) -> String {
    let fixed = money_string(d.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    // Every Decimal integer part fits in a u128.
    let grouped = int_part
        .parse::<u128>()
        .map(|v| v.to_formatted_string(&Locale::es))
        .unwrap_or_else(|_| int_part.to_string());
    let res = format!("{},{}", grouped, frac_part);
    if d.is_sign_negative() && !round_money(d).is_zero() {
        format!("-{}", res)
    } else {
        res
    }
}

/// Percentages for console output, one decimal.
pub fn format_pct(d: Decimal) -> String {
    let mut r = d.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    r.rescale(1);
    format!("{}%", r.to_string().replace('.', ","))
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::es)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn normalize_text_strips_accents_and_spaces() {
        assert_eq!(normalize_text("  Facturación   Bruta "), "facturacion bruta");
        assert_eq!(normalize_text("RAZÓN SOCIAL"), "razon social");
        assert_eq!(normalize_text("Año"), "ano");
    }

    #[test]
    fn parse_amount_handles_locales() {
        assert_eq!(parse_amount("1.234,56 €"), Ok(Some(dec!(1234.56))));
        assert_eq!(parse_amount("1,234.56"), Ok(Some(dec!(1234.56))));
        assert_eq!(parse_amount("300,5"), Ok(Some(dec!(300.5))));
        assert_eq!(parse_amount("1000"), Ok(Some(dec!(1000))));
        assert_eq!(parse_amount(""), Ok(None));
        assert_eq!(parse_amount("NaN"), Ok(None));
    }

    #[test]
    fn parse_amount_rejects_text_and_negatives() {
        assert_eq!(
            parse_amount("pendiente"),
            Err(SkipReason::NonNumericRevenue("pendiente".to_string()))
        );
        assert_eq!(
            parse_amount("-5"),
            Err(SkipReason::NegativeRevenue(dec!(-5)))
        );
    }

    #[test]
    fn round_money_is_half_up() {
        assert_eq!(round_money(dec!(0.125)), dec!(0.13));
        assert_eq!(round_money(dec!(0.124)), dec!(0.12));
        assert_eq!(money_string(dec!(50)), "50.00");
        assert_eq!(decimal_comma(dec!(1234.5)), "1234,50");
    }

    #[test]
    fn format_pct_uses_decimal_comma() {
        assert_eq!(format_pct(dec!(-40)), "-40,0%");
        assert_eq!(format_pct(dec!(33.333)), "33,3%");
    }

    #[test]
    fn format_money_keeps_amounts_beyond_i64() {
        let big = Decimal::from_str("12345678901234567890123.455").unwrap();
        let shown = format_money(big);
        assert_eq!(
            shown,
            format!("{},46", format_int(12_345_678_901_234_567_890_123u128))
        );
        assert_eq!(format_money(-big), format!("-{}", shown));
    }
}
