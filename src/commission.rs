use crate::error::{CommissionError, Result};
use crate::types::{CanonicalRow, CommissionRow, Totals};
use crate::util::round_money;
use rust_decimal::Decimal;

/// `revenue * rate / 100`, rounded half-up to cents at the amount.
pub fn commission_amount(revenue: Decimal, rate: Decimal) -> Result<Decimal> {
    revenue
        .checked_mul(rate)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .map(round_money)
        .ok_or(CommissionError::Overflow("commission"))
}

/// Rates are percentages, `>= 0`, with no upper bound.
pub fn validate_rate(rate: Decimal) -> Result<Decimal> {
    if rate.is_sign_negative() && !rate.is_zero() {
        return Err(CommissionError::InvalidRate(rate));
    }
    Ok(rate)
}

pub fn apply_commission(rows: &[CanonicalRow], rate: Decimal) -> Result<Vec<CommissionRow>> {
    let rate = validate_rate(rate)?;
    rows.iter()
        .map(|r| {
            Ok(CommissionRow {
                salesperson: r.salesperson.clone(),
                client: r.client.clone(),
                period: r.period.clone(),
                gross_revenue: r.gross_revenue,
                commission_amount: commission_amount(r.gross_revenue, rate)?,
            })
        })
        .collect()
}

/// Grand totals; the commission total is the sum of already-rounded amounts.
///
/// Every view sums a subset of these non-negative rows, so once the totals
/// fit, no per-view sum can overflow.
pub fn totals(rows: &[CommissionRow]) -> Result<Totals> {
    rows.iter().try_fold(Totals::default(), |mut acc, r| {
        acc.total_revenue = acc
            .total_revenue
            .checked_add(r.gross_revenue)
            .ok_or(CommissionError::Overflow("revenue total"))?;
        acc.total_commission = acc
            .total_commission
            .checked_add(r.commission_amount)
            .ok_or(CommissionError::Overflow("commission total"))?;
        acc.row_count += 1;
        Ok(acc)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::parse_period;
    use rust_decimal_macros::dec;

    fn row(client: &str, revenue: Decimal) -> CanonicalRow {
        CanonicalRow {
            salesperson: "Ana".into(),
            client: client.into(),
            period: parse_period("enero 2025"),
            gross_revenue: revenue,
        }
    }

    #[test]
    fn five_percent_of_a_thousand() {
        let rows = apply_commission(&[row("X", dec!(1000))], dec!(5)).unwrap();
        assert_eq!(rows[0].commission_amount, dec!(50.00));
        let t = totals(&rows).unwrap();
        assert_eq!(t.total_revenue, dec!(1000.00));
        assert_eq!(t.total_commission, dec!(50.00));
        assert_eq!(t.row_count, 1);
    }

    #[test]
    fn rounding_is_half_up_at_the_amount() {
        assert_eq!(commission_amount(dec!(10.25), dec!(5)).unwrap(), dec!(0.51));
        assert_eq!(commission_amount(dec!(10.30), dec!(5)).unwrap(), dec!(0.52));
        assert_eq!(commission_amount(dec!(0.01), dec!(33.333)).unwrap(), dec!(0.00));
    }

    #[test]
    fn zero_and_large_rates_are_valid() {
        let rows = apply_commission(&[row("X", dec!(200))], dec!(0)).unwrap();
        assert_eq!(rows[0].commission_amount, dec!(0));
        let rows = apply_commission(&[row("X", dec!(200))], dec!(150)).unwrap();
        assert_eq!(rows[0].commission_amount, dec!(300));
    }

    #[test]
    fn negative_rate_is_rejected() {
        assert!(matches!(
            apply_commission(&[row("X", dec!(1))], dec!(-1)),
            Err(CommissionError::InvalidRate(_))
        ));
    }

    #[test]
    fn totals_of_nothing_are_zero() {
        assert_eq!(totals(&[]).unwrap(), Totals::default());
    }

    #[test]
    fn huge_rate_is_an_error_not_a_panic() {
        assert!(matches!(
            apply_commission(&[row("X", dec!(1000))], Decimal::MAX),
            Err(CommissionError::Overflow(_))
        ));
    }

    #[test]
    fn totals_overflow_is_reported() {
        let big = CommissionRow {
            salesperson: "Ana".into(),
            client: "X".into(),
            period: parse_period("enero 2025"),
            gross_revenue: Decimal::MAX,
            commission_amount: dec!(0),
        };
        assert!(matches!(
            totals(&[big.clone(), big]),
            Err(CommissionError::Overflow("revenue total"))
        ));
    }
}
