//! Input validation for orders.
//!
//! Validation collects every violated constraint instead of stopping at the
//! first one, so callers can report the full list back to the user.

use serde::Serialize;
use std::fmt;

use crate::TokenSymbol;

/// Smallest purchasable amount in kobo (₦1,000).
pub const MIN_AMOUNT_MINOR: i64 = 100_000;

/// Largest purchasable amount in kobo (₦500,000).
pub const MAX_AMOUNT_MINOR: i64 = 50_000_000;

/// Number of hex digits after the `0x` prefix of a wallet address.
pub const WALLET_ADDRESS_HEX_LEN: usize = 64;

/// A single violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// The offending field, in wire naming.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

/// Every constraint violated by one input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldViolation>);

impl ValidationErrors {
    /// An empty set of violations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A set containing exactly one violation.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    /// Record a violation.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldViolation {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Whether nothing was violated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The recorded violations.
    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    /// Whether a given field has at least one violation.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|v| v.field == field)
    }

    /// `Ok(value)` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` if any violation was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for violation in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", violation.field, violation.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Check a wallet address: `0x` followed by exactly 64 hex digits.
///
/// # Errors
///
/// Returns a human-readable reason when the address is malformed.
pub fn check_wallet_address(address: &str) -> Result<(), String> {
    let Some(hex) = address.strip_prefix("0x") else {
        return Err("wallet address must start with 0x".into());
    };
    if hex.len() != WALLET_ADDRESS_HEX_LEN {
        return Err(format!(
            "wallet address must have {WALLET_ADDRESS_HEX_LEN} hex digits after 0x"
        ));
    }
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err("wallet address must be hexadecimal".into());
    }
    Ok(())
}

/// Canonical form of a wallet address used for storage and lookups.
#[must_use]
pub fn normalize_wallet_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// Check a purchase amount in kobo against the configured bounds.
///
/// # Errors
///
/// Returns a human-readable reason when the amount is out of range.
pub fn check_amount(amount_minor: i64) -> Result<(), String> {
    if (MIN_AMOUNT_MINOR..=MAX_AMOUNT_MINOR).contains(&amount_minor) {
        Ok(())
    } else {
        Err(format!(
            "amount must be between ₦{} and ₦{}",
            MIN_AMOUNT_MINOR / 100,
            MAX_AMOUNT_MINOR / 100
        ))
    }
}

/// Light structural email check; delivery is the mail provider's problem.
///
/// # Errors
///
/// Returns a human-readable reason when the address is malformed.
pub fn check_email(email: &str) -> Result<(), String> {
    let invalid = || Err("invalid email address".to_string());

    if email.chars().any(char::is_whitespace) {
        return invalid();
    }
    let Some((local, domain)) = email.split_once('@') else {
        return invalid();
    };
    if local.is_empty() || domain.contains('@') {
        return invalid();
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && tld.len() >= 2 => Ok(()),
        _ => invalid(),
    }
}

/// Parse a token symbol, recording a violation on failure.
fn parse_symbol(raw: Option<&str>, errors: &mut ValidationErrors) -> Option<TokenSymbol> {
    match raw {
        None => {
            errors.push("token_symbol", "token_symbol is required");
            None
        }
        Some(raw) => match raw.parse::<TokenSymbol>() {
            Ok(symbol) => Some(symbol),
            Err(e) => {
                errors.push("token_symbol", e.to_string());
                None
            }
        },
    }
}

fn parse_amount(raw: Option<i64>, errors: &mut ValidationErrors) -> Option<i64> {
    match raw {
        None => {
            errors.push("amount_minor", "amount_minor is required");
            None
        }
        Some(amount) => match check_amount(amount) {
            Ok(()) => Some(amount),
            Err(msg) => {
                errors.push("amount_minor", msg);
                None
            }
        },
    }
}

/// A validated quote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteInput {
    /// Token being bought.
    pub token: TokenSymbol,
    /// Fiat amount in kobo.
    pub amount_minor: i64,
}

impl QuoteInput {
    /// Validate raw quote fields.
    ///
    /// # Errors
    ///
    /// Returns every violated constraint.
    pub fn parse(token_symbol: Option<&str>, amount_minor: Option<i64>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let token = parse_symbol(token_symbol, &mut errors);
        let amount = parse_amount(amount_minor, &mut errors);

        match (token, amount) {
            (Some(token), Some(amount_minor)) if errors.is_empty() => Ok(Self {
                token,
                amount_minor,
            }),
            _ => Err(errors),
        }
    }
}

/// A validated purchase order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Token being bought.
    pub token: TokenSymbol,
    /// Fiat amount in kobo.
    pub amount_minor: i64,
    /// Destination wallet, normalized.
    pub wallet_address: String,
    /// Optional contact email.
    pub email: Option<String>,
}

impl Order {
    /// Validate raw order fields.
    ///
    /// # Errors
    ///
    /// Returns every violated constraint.
    pub fn parse(
        token_symbol: Option<&str>,
        amount_minor: Option<i64>,
        wallet_address: Option<&str>,
        email: Option<&str>,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let token = parse_symbol(token_symbol, &mut errors);
        let amount = parse_amount(amount_minor, &mut errors);

        let wallet = match wallet_address.map(str::trim) {
            None | Some("") => {
                errors.push("wallet_address", "wallet_address is required");
                None
            }
            Some(raw) => match check_wallet_address(raw) {
                Ok(()) => Some(normalize_wallet_address(raw)),
                Err(msg) => {
                    errors.push("wallet_address", msg);
                    None
                }
            },
        };

        let email = match email.map(str::trim) {
            None | Some("") => None,
            Some(raw) => match check_email(raw) {
                Ok(()) => Some(raw.to_string()),
                Err(msg) => {
                    errors.push("email", msg);
                    None
                }
            },
        };

        match (token, amount, wallet) {
            (Some(token), Some(amount_minor), Some(wallet_address)) if errors.is_empty() => {
                Ok(Self {
                    token,
                    amount_minor,
                    wallet_address,
                    email,
                })
            }
            _ => Err(errors),
        }
    }
}
