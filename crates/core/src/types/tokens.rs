//! Amounts of the storefront's virtual currency.
//!
//! Tokens are whole units with no rounding or currency conversion.
//! They are unrelated to authentication tokens.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use serde::{Deserialize, Serialize};

/// A number of tokens.
///
/// Arithmetic saturates instead of overflowing so a corrupt price can
/// never wrap a cart total into a negative amount.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Tokens(i64);

impl Tokens {
    /// Zero tokens.
    pub const ZERO: Self = Self(0);

    /// Create an amount.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Get the raw amount.
    #[must_use]
    pub const fn amount(&self) -> i64 {
        self.0
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(i64::from(quantity)))
    }

    /// Subtract, returning `None` if the result would be negative.
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(rest) if rest >= 0 => Some(Self(rest)),
            _ => None,
        }
    }
}

impl Add for Tokens {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Tokens {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<i64> for Tokens {
    fn from(amount: i64) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 1 {
            write!(f, "1 token")
        } else {
            write!(f, "{} tokens", self.0)
        }
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Tokens {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Tokens {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Tokens {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_times() {
        assert_eq!(Tokens::new(100).times(2), Tokens::new(200));
        assert_eq!(Tokens::new(100).times(0), Tokens::ZERO);
    }

    #[test]
    fn test_sum_saturates() {
        let total: Tokens = [Tokens::new(i64::MAX), Tokens::new(5)].into_iter().sum();
        assert_eq!(total, Tokens::new(i64::MAX));
    }

    #[test]
    fn test_checked_sub() {
        assert_eq!(
            Tokens::new(300).checked_sub(Tokens::new(200)),
            Some(Tokens::new(100))
        );
        assert_eq!(Tokens::new(100).checked_sub(Tokens::new(200)), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Tokens::new(1).to_string(), "1 token");
        assert_eq!(Tokens::new(250).to_string(), "250 tokens");
    }
}
