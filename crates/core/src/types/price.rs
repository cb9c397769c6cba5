//! Type-safe price representation using decimal arithmetic.

use core::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input is not a decimal number.
    #[error("price must be a number")]
    NotANumber,
    /// The amount is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// More than two decimal places.
    #[error("price cannot have more than {} decimal places", MAX_SCALE)]
    TooPrecise,
    /// Larger than the stored `NUMERIC(12, 2)` column allows.
    #[error("price cannot exceed {}", Price::MAX)]
    TooLarge,
}

/// Decimal places a price may carry.
const MAX_SCALE: u32 = 2;

/// A non-negative amount in the store currency's standard unit
/// (rupees, not paise).
///
/// Serialized as a decimal string to avoid float rounding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// A price of zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest representable price, `9999999999.99`.
    pub const MAX: Self = Self(Decimal::from_parts(3_567_587_327, 232, 0, false, 2));

    /// Create a new price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if `amount` is below zero,
    /// [`PriceError::TooPrecise`] for sub-paise amounts, and
    /// [`PriceError::TooLarge`] above [`Price::MAX`].
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        let amount = amount.normalize();
        if amount.scale() > MAX_SCALE {
            return Err(PriceError::TooPrecise);
        }
        if amount > Self::MAX.0 {
            return Err(PriceError::TooLarge);
        }
        Ok(Self(amount))
    }

    /// Parse a price from user input such as `"149.50"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a decimal or is negative.
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let amount = Decimal::from_str(s.trim()).map_err(|_| PriceError::NotANumber)?;
        Self::new(amount)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Amount in minor units (paise), as payment gateways expect.
    ///
    /// Returns `None` if the value does not fit in an `i64`.
    #[must_use]
    pub fn to_minor_units(&self) -> Option<i64> {
        self.0.checked_mul(Decimal::ONE_HUNDRED)?.trunc().to_i64()
    }

    /// Line total for `quantity` units, `None` on overflow.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Option<Decimal> {
        self.0.checked_mul(Decimal::from(quantity))
    }

    /// Whether the amount is strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Price::parse("100").unwrap().amount(), Decimal::from(100));
        assert_eq!(Price::parse(" 0 ").unwrap(), Price::ZERO);
        assert_eq!(Price::parse("abc"), Err(PriceError::NotANumber));
        assert_eq!(Price::parse("-1"), Err(PriceError::Negative));
    }

    #[test]
    fn test_normalizes_scale() {
        assert_eq!(Price::parse("10.50").unwrap(), Price::parse("10.5").unwrap());
    }

    #[test]
    fn test_limits() {
        assert_eq!(Price::parse("0.001"), Err(PriceError::TooPrecise));
        assert_eq!(Price::parse("19.995"), Err(PriceError::TooPrecise));
        assert_eq!(Price::parse("10000000000"), Err(PriceError::TooLarge));
        assert_eq!(
            Price::new(Decimal::MAX),
            Err(PriceError::TooLarge)
        );
        assert_eq!(Price::parse("9999999999.99").unwrap(), Price::MAX);
        assert_eq!(Price::MAX.to_string(), "9999999999.99");
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(Price::parse("200").unwrap().to_minor_units(), Some(20_000));
        assert_eq!(Price::parse("19.99").unwrap().to_minor_units(), Some(1999));
        assert_eq!(Price::parse("0.01").unwrap().to_minor_units(), Some(1));
        assert_eq!(Price::MAX.to_minor_units(), Some(999_999_999_999));
    }

    #[test]
    fn test_times() {
        let price = Price::parse("12.5").unwrap();
        assert_eq!(price.times(4), Some(Decimal::from(50)));
        assert_eq!(
            Price::MAX.times(u32::MAX),
            Some(Price::MAX.amount() * Decimal::from(u32::MAX))
        );
    }

    #[test]
    fn test_deserialize_accepts_number_and_string() {
        let from_number: Price = serde_json::from_str("149").unwrap();
        let from_string: Price = serde_json::from_str("\"149\"").unwrap();
        assert_eq!(from_number, from_string);
        assert!(serde_json::from_str::<Price>("-5").is_err());
    }
}
