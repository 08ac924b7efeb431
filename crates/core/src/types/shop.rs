//! Shop domain type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ShopDomain`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopDomainError {
    /// The input string is empty.
    #[error("shop domain cannot be empty")]
    Empty,
    /// The input does not end with `.myshopify.com`.
    #[error("shop domain must end with {suffix}")]
    WrongSuffix {
        /// Required suffix.
        suffix: &'static str,
    },
    /// The store name contains characters other than ASCII letters, digits and `-`.
    #[error("shop name contains invalid characters: {0}")]
    InvalidName(String),
}

/// A merchant storefront domain, e.g. `my-store.myshopify.com`.
///
/// Shops arrive as query parameters on unauthenticated requests, so anything
/// that reaches Shopify (OAuth redirects, token exchange) goes through this type.
///
/// ## Constraints
///
/// - Ends with `.myshopify.com` (case-insensitive, stored lowercase)
/// - Store name is non-empty, starts with a letter or digit, and contains only
///   ASCII letters, digits and `-`
///
/// ## Examples
///
/// ```
/// use hookgate_core::ShopDomain;
///
/// assert!(ShopDomain::parse("my-store.myshopify.com").is_ok());
/// assert!(ShopDomain::parse("evil.com").is_err());
/// assert!(ShopDomain::parse("a.b.myshopify.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Suffix every shop domain carries.
    pub const SUFFIX: &'static str = ".myshopify.com";

    /// Parse a `ShopDomain` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, lacks the `.myshopify.com`
    /// suffix, or has an invalid store name.
    pub fn parse(s: &str) -> Result<Self, ShopDomainError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ShopDomainError::Empty);
        }

        let lower = trimmed.to_ascii_lowercase();
        let name = lower
            .strip_suffix(Self::SUFFIX)
            .ok_or(ShopDomainError::WrongSuffix {
                suffix: Self::SUFFIX,
            })?;

        let starts_ok = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric());
        let chars_ok = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !starts_ok || !chars_ok {
            return Err(ShopDomainError::InvalidName(name.to_string()));
        }

        Ok(Self(lower))
    }

    /// Returns the shop domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ShopDomain` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ShopDomain {
    type Err = ShopDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShopDomain {
    type Error = ShopDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShopDomain> for String {
    fn from(shop: ShopDomain) -> Self {
        shop.0
    }
}

impl AsRef<str> for ShopDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
