//! City name type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`CityName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CityError {
    /// Empty or whitespace only.
    #[error("city cannot be empty")]
    Empty,
    /// Longer than allowed.
    #[error("city must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A city as the user typed it.
///
/// Stored and compared exactly as given, so `"Paris"` and `"paris"` are two
/// different favorites. Cache keys use [`CityName::normalized`] instead, so
/// both share one cache entry.
///
/// ```
/// use nimbus_core::CityName;
///
/// let city = CityName::parse("São Paulo").unwrap();
/// assert_eq!(city.as_str(), "São Paulo");
/// assert_eq!(city.normalized(), "são paulo");
/// assert!(CityName::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct CityName(String);

impl CityName {
    /// Maximum length in characters.
    pub const MAX_LENGTH: usize = 100;

    /// Parse a `CityName` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank or longer than 100 characters.
    pub fn parse(s: &str) -> Result<Self, CityError> {
        if s.trim().is_empty() {
            return Err(CityError::Empty);
        }
        if s.chars().count() > Self::MAX_LENGTH {
            return Err(CityError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the city exactly as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form used for cache keys.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }

    /// Consumes the `CityName` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CityName {
    type Err = CityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CityName {
    type Error = CityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CityName> for String {
    fn from(value: CityName) -> Self {
        value.0
    }
}

impl AsRef<str> for CityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for CityName {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for CityName {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for CityName {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_original_case() {
        let city = CityName::parse("New York").unwrap();
        assert_eq!(city.as_str(), "New York");
        assert_ne!(city, CityName::parse("new york").unwrap());
    }

    #[test]
    fn test_normalized_is_lowercase() {
        assert_eq!(CityName::parse("PARIS").unwrap().normalized(), "paris");
    }

    #[test]
    fn test_rejects_blank() {
        assert_eq!(CityName::parse(""), Err(CityError::Empty));
        assert_eq!(CityName::parse(" \t"), Err(CityError::Empty));
    }

    #[test]
    fn test_rejects_too_long() {
        assert!(CityName::parse(&"x".repeat(100)).is_ok());
        assert_eq!(
            CityName::parse(&"x".repeat(101)),
            Err(CityError::TooLong { max: 100 })
        );
    }
}
