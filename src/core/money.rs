//! Fixed-point money helpers.
//!
//! Amounts travel as [`Decimal`] and are stored as integer minor units. The
//! number of minor digits depends on the currency, so every conversion takes
//! the ISO code along with the amount.

use crate::errors::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Largest gap accepted between a requested total and the expected one.
pub const SUM_TOLERANCE: Decimal = dec!(0.01);

const ZERO_DIGIT_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "ISK", "JPY", "KMF", "KRW", "PYG", "RWF", "UGX", "UYI", "VND",
    "VUV", "XAF", "XOF", "XPF",
];
const THREE_DIGIT_CURRENCIES: &[&str] = &["BHD", "IQD", "JOD", "KWD", "LYD", "OMR", "TND"];

/// Number of minor-unit digits of `currency`.
#[must_use]
pub fn minor_digits(currency: &str) -> u32 {
    if ZERO_DIGIT_CURRENCIES.contains(&currency) {
        0
    } else if THREE_DIGIT_CURRENCIES.contains(&currency) {
        3
    } else {
        2
    }
}

fn unit_factor(currency: &str) -> Decimal {
    Decimal::from(10_i64.pow(minor_digits(currency)))
}

/// Upper-cases and checks an ISO 4217 code.
pub fn normalize_currency(code: &str) -> Result<String> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::validation(
            "currency",
            format!("'{code}' is not an ISO 4217 currency code"),
        ));
    }
    Ok(code)
}

/// Converts an amount to minor units, rejecting precision the currency does not have.
pub fn to_minor(amount: Decimal, currency: &str, field: &str) -> Result<i64> {
    let units = amount
        .checked_mul(unit_factor(currency))
        .ok_or_else(|| out_of_range(field, amount))?;
    if !units.fract().is_zero() {
        return Err(Error::InvalidAmount {
            field: field.to_string(),
            amount,
            reason: format!("has more than {} decimal places for {currency}", minor_digits(currency)),
        });
    }
    units.to_i64().ok_or_else(|| out_of_range(field, amount))
}

/// Converts an amount to minor units, rounding half away from zero.
pub fn round_to_minor(amount: Decimal, currency: &str, field: &str) -> Result<i64> {
    let units = amount
        .checked_mul(unit_factor(currency))
        .ok_or_else(|| out_of_range(field, amount))?;
    round_units(units).ok_or_else(|| out_of_range(field, amount))
}

/// Rounds a fractional count of minor units half away from zero.
pub(crate) fn round_units(units: Decimal) -> Option<i64> {
    units
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Converts an amount that must be strictly positive.
pub fn positive_minor(amount: Decimal, currency: &str, field: &str) -> Result<i64> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount {
            field: field.to_string(),
            amount,
            reason: "must be greater than zero".to_string(),
        });
    }
    to_minor(amount, currency, field)
}

/// Converts an amount that must not be negative.
pub fn non_negative_minor(amount: Decimal, currency: &str, field: &str) -> Result<i64> {
    if amount < Decimal::ZERO {
        return Err(Error::InvalidAmount {
            field: field.to_string(),
            amount,
            reason: "must not be negative".to_string(),
        });
    }
    to_minor(amount, currency, field)
}

/// Minor units back to a decimal amount with the currency's scale.
#[must_use]
pub fn from_minor(units: i64, currency: &str) -> Decimal {
    Decimal::new(units, minor_digits(currency))
}

/// Spreads `residual` minor units over `shares`, one unit at a time in input
/// order, wrapping around when the residual exceeds the number of shares.
///
/// A negative residual takes units away and skips shares already at zero.
/// The caller guarantees the total stays non-negative, so the loop ends.
pub fn distribute_residual(shares: &mut [i64], residual: i64) {
    if shares.is_empty() {
        return;
    }
    let mut remaining = residual;
    let mut index = 0;
    while remaining > 0 {
        shares[index % shares.len()] += 1;
        remaining -= 1;
        index += 1;
    }
    while remaining < 0 {
        let slot = &mut shares[index % shares.len()];
        if *slot > 0 {
            *slot -= 1;
            remaining += 1;
        }
        index += 1;
    }
}

fn out_of_range(field: &str, amount: Decimal) -> Error {
    Error::InvalidAmount {
        field: field.to_string(),
        amount,
        reason: "is out of range".to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_minor_digits_by_currency() {
        assert_eq!(minor_digits("USD"), 2);
        assert_eq!(minor_digits("INR"), 2);
        assert_eq!(minor_digits("JPY"), 0);
        assert_eq!(minor_digits("KWD"), 3);
    }

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency(" inr ").unwrap(), "INR");
        assert!(normalize_currency("RUPEE").is_err());
        assert!(normalize_currency("U$D").is_err());
    }

    #[test]
    fn test_to_minor_rejects_sub_unit_precision() {
        assert_eq!(to_minor(dec!(12.34), "USD", "amount").unwrap(), 1234);
        assert_eq!(to_minor(dec!(500), "JPY", "amount").unwrap(), 500);
        assert!(matches!(
            to_minor(dec!(12.345), "USD", "amount"),
            Err(Error::InvalidAmount { .. })
        ));
        assert!(to_minor(dec!(1.5), "JPY", "amount").is_err());
    }

    #[test]
    fn test_round_to_minor_half_away_from_zero() {
        assert_eq!(round_to_minor(dec!(0.005), "USD", "x").unwrap(), 1);
        assert_eq!(round_to_minor(dec!(0.004), "USD", "x").unwrap(), 0);
        assert_eq!(round_to_minor(dec!(-0.005), "USD", "x").unwrap(), -1);
    }

    #[test]
    fn test_positive_minor() {
        assert!(positive_minor(Decimal::ZERO, "USD", "amount").is_err());
        assert!(positive_minor(dec!(-1), "USD", "amount").is_err());
        assert_eq!(positive_minor(dec!(0.01), "USD", "amount").unwrap(), 1);
    }

    #[test]
    fn test_from_minor_keeps_currency_scale() {
        assert_eq!(from_minor(3334, "USD"), dec!(33.34));
        assert_eq!(from_minor(3334, "USD").to_string(), "33.34");
        assert_eq!(from_minor(1500, "JPY"), dec!(1500));
        assert_eq!(from_minor(1500, "KWD").to_string(), "1.500");
    }

    #[test]
    fn test_distribute_residual_positive_goes_to_first() {
        let mut shares = vec![3333, 3333, 3333];
        distribute_residual(&mut shares, 1);
        assert_eq!(shares, vec![3334, 3333, 3333]);
    }

    #[test]
    fn test_distribute_residual_wraps() {
        let mut shares = vec![0, 0];
        distribute_residual(&mut shares, 5);
        assert_eq!(shares, vec![3, 2]);
    }

    #[test]
    fn test_distribute_residual_negative_skips_zero_shares() {
        let mut shares = vec![0, 5, 5];
        distribute_residual(&mut shares, -3);
        assert_eq!(shares, vec![0, 3, 4]);
        assert_eq!(shares.iter().sum::<i64>(), 7);
    }
}
