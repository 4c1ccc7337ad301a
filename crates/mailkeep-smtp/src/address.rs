//! Envelope address handling.

use crate::error::{Error, Result};

/// A validated SMTP envelope address (bare `local@domain`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates an address from a bare `local@domain` string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not well-formed.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        if !is_well_formed(&addr) {
            return Err(Error::InvalidAddress(addr));
        }
        Ok(Self(addr))
    }

    /// Parses an address out of a header-style mailbox.
    ///
    /// Accepts either a bare address or a display form such as
    /// `Jane Doe <jane@example.com>`.
    ///
    /// # Errors
    ///
    /// Returns an error if no well-formed address can be extracted.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if let Some(start) = input.rfind('<')
            && let Some(end) = input.rfind('>')
            && start < end
        {
            return Self::new(input[start + 1..end].trim());
        }
        Self::new(input)
    }

    /// Returns the bare address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Minimal structural check: one `@`, non-empty local and domain parts,
/// no whitespace or angle brackets.
fn is_well_formed(addr: &str) -> bool {
    if addr.contains(|c: char| c.is_whitespace() || c == '<' || c == '>') {
        return false;
    }
    match addr.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        None => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bare_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.to_string(), "user@example.com");
    }

    #[test]
    fn rejects_malformed() {
        assert!(Address::new("").is_err());
        assert!(Address::new("userexample.com").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
        assert!(Address::new("a@b@c").is_err());
        assert!(Address::new("user name@example.com").is_err());
    }

    #[test]
    fn parse_display_form() {
        let addr = Address::parse("Jane Doe <jane@example.com>").unwrap();
        assert_eq!(addr.as_str(), "jane@example.com");
    }

    #[test]
    fn parse_bare_form() {
        let addr = Address::parse("  jane@example.com ").unwrap();
        assert_eq!(addr.as_str(), "jane@example.com");
    }

    #[test]
    fn parse_rejects_empty_brackets() {
        assert!(Address::parse("Jane <>").is_err());
    }
}
