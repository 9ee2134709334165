//! Spend amount coercion
//!
//! `Total_amount` arrives as text in seeded data and may later be stored as
//! a double or a `Decimal128`. Every backend coerces it through
//! [`coerce_amount`] so that malformed values fail the same way.

use crate::error::{LoyaltyError, Result};
use crate::store::types::{HighSpender, SpendRow};
use mongodb::bson::Bson;

/// Coerce a raw amount to a finite, non-negative number.
pub fn coerce_amount(member_id: i32, raw: &Bson) -> Result<f64> {
    let value = match raw {
        Bson::String(text) => text.trim().parse::<f64>().ok(),
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
        _ => None,
    };

    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(LoyaltyError::MalformedAmount {
            member_id,
            raw: match raw {
                Bson::String(text) => text.clone(),
                Bson::Decimal128(d) => d.to_string(),
                other => other.to_string(),
            },
        }),
    }
}

/// Arithmetic mean, `0.0` for an empty input
pub fn mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Coerce joined rows and keep those strictly above `threshold`.
///
/// Stops at the first malformed amount.
pub fn high_spenders_from_rows(rows: Vec<SpendRow>, threshold: f64) -> Result<Vec<HighSpender>> {
    let mut spenders = Vec::new();
    for row in rows {
        let total = coerce_amount(row.member_id, &row.total_amount)?;
        if total > threshold {
            spenders.push(HighSpender {
                member_id: row.member_id,
                name: row.name.unwrap_or_default(),
                total,
            });
        }
    }
    Ok(spenders)
}

/// Mean of the coerced amounts of `rows`.
pub fn average_spend_from_rows(rows: &[SpendRow]) -> Result<f64> {
    let amounts = rows
        .iter()
        .map(|row| coerce_amount(row.member_id, &row.total_amount))
        .collect::<Result<Vec<f64>>>()?;
    Ok(mean(amounts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Decimal128;
    use std::str::FromStr;

    fn row(member_id: i32, name: &str, amount: Bson) -> SpendRow {
        SpendRow {
            member_id,
            name: Some(name.to_string()),
            total_amount: amount,
        }
    }

    #[test]
    fn test_coerce_text_and_numbers() {
        assert_eq!(coerce_amount(1, &Bson::String("5.43".into())).unwrap(), 5.43);
        assert_eq!(coerce_amount(1, &Bson::String(" 20 ".into())).unwrap(), 20.0);
        assert_eq!(coerce_amount(1, &Bson::Double(7.25)).unwrap(), 7.25);
        assert_eq!(coerce_amount(1, &Bson::Int32(3)).unwrap(), 3.0);
        assert_eq!(coerce_amount(1, &Bson::Int64(12)).unwrap(), 12.0);
    }

    #[test]
    fn test_coerce_decimal128() {
        let amount = Decimal128::from_str("5.43").unwrap();
        assert_eq!(coerce_amount(1, &Bson::Decimal128(amount)).unwrap(), 5.43);

        let negative = Decimal128::from_str("-0.50").unwrap();
        match coerce_amount(2, &Bson::Decimal128(negative)) {
            Err(LoyaltyError::MalformedAmount { member_id, raw }) => {
                assert_eq!(member_id, 2);
                assert_eq!(raw, "-0.50");
            }
            other => panic!("expected MalformedAmount, got {:?}", other),
        }
    }

    #[test]
    fn test_coerce_rejects_malformed() {
        for raw in [
            Bson::String("12,5".into()),
            Bson::String("".into()),
            Bson::String("NaN".into()),
            Bson::String("-4.0".into()),
            Bson::Null,
            Bson::Boolean(true),
        ] {
            match coerce_amount(9, &raw) {
                Err(LoyaltyError::MalformedAmount { member_id, .. }) => assert_eq!(member_id, 9),
                other => panic!("expected MalformedAmount for {:?}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_malformed_keeps_raw_text() {
        let err = coerce_amount(4, &Bson::String("abc".into())).unwrap_err();
        match err {
            LoyaltyError::MalformedAmount { raw, .. } => assert_eq!(raw, "abc"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(Vec::<f64>::new()), 0.0);
        assert_eq!(mean([2.0, 4.0, 9.0]), 5.0);
    }

    #[test]
    fn test_high_spenders_strictly_above_threshold() {
        let rows = vec![
            row(1, "Ashby, Lazale", Bson::String("5.1".into())),
            row(2, "Breton, Robert", Bson::String("5.11".into())),
            row(3, "Campbell, Jessie", Bson::Double(20.0)),
        ];
        let spenders = high_spenders_from_rows(rows, 5.1).unwrap();
        let ids: Vec<i32> = spenders.iter().map(|s| s.member_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_average_spend_fails_fast() {
        let rows = vec![
            row(1, "Ashby, Lazale", Bson::String("4.0".into())),
            row(2, "Breton, Robert", Bson::String("four".into())),
        ];
        assert!(matches!(
            average_spend_from_rows(&rows),
            Err(LoyaltyError::MalformedAmount { member_id: 2, .. })
        ));
        assert_eq!(average_spend_from_rows(&[]).unwrap(), 0.0);
    }
}
