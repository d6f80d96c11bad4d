//! Phone number type normalized to Indian E.164 form.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum PhoneError {
    /// The input string contains no digits.
    #[error("phone number cannot be empty")]
    Empty,
    /// The digits do not match any accepted national or international form.
    #[error("unrecognized phone number format ({digits} digits)")]
    UnrecognizedFormat {
        /// Number of digits found in the input.
        digits: usize,
    },
    /// The input is not a bare 10-digit national number.
    #[error("phone number must be exactly 10 digits")]
    NotTenDigits,
}

/// A phone number stored in E.164 form (`+91` followed by ten digits).
///
/// Normalization strips every non-digit character and then accepts:
///
/// - ten digits (a national number): `9876543210` → `+919876543210`
/// - twelve digits starting with the country code: `919876543210` → `+919876543210`
/// - eleven digits starting with the trunk prefix: `09876543210` → `+919876543210`
///
/// Anything else is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Country calling code for India.
    pub const COUNTRY_CODE: &'static str = "91";

    /// Parse a phone number in any accepted form, normalizing to E.164.
    ///
    /// # Errors
    ///
    /// Returns [`PhoneError::Empty`] when the input has no digits and
    /// [`PhoneError::UnrecognizedFormat`] when the digit count does not match
    /// an accepted form.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let digits: String = s.chars().filter(char::is_ascii_digit).collect();

        if digits.is_empty() {
            return Err(PhoneError::Empty);
        }

        if digits.len() == 12 && digits.starts_with(Self::COUNTRY_CODE) {
            return Ok(Self(format!("+{digits}")));
        }

        if digits.len() == 10 {
            return Ok(Self(format!("+{}{digits}", Self::COUNTRY_CODE)));
        }

        if digits.len() == 11 && digits.starts_with('0') {
            let national = digits.get(1..).unwrap_or("");
            return Ok(Self(format!("+{}{national}", Self::COUNTRY_CODE)));
        }

        Err(PhoneError::UnrecognizedFormat {
            digits: digits.len(),
        })
    }

    /// Parse a bare 10-digit national number, as entered in the sign-in form.
    ///
    /// Stricter than [`PhoneNumber::parse`]: the input must be exactly ten
    /// ASCII digits with no punctuation, country code, or trunk prefix.
    ///
    /// # Errors
    ///
    /// Returns [`PhoneError::NotTenDigits`] for any other input.
    pub fn parse_national(s: &str) -> Result<Self, PhoneError> {
        if s.len() != 10 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(PhoneError::NotTenDigits);
        }
        Ok(Self(format!("+{}{s}", Self::COUNTRY_CODE)))
    }

    /// Returns the E.164 representation (e.g. `+919876543210`).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the 10-digit national part (e.g. `9876543210`).
    #[must_use]
    pub fn national(&self) -> &str {
        // Invariant: the stored form is always "+91" + 10 digits.
        self.0.get(3..).unwrap_or("")
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_national_form() {
        let phone = PhoneNumber::parse("9876543210").unwrap();
        assert_eq!(phone.as_str(), "+919876543210");
        assert_eq!(phone.national(), "9876543210");
    }

    #[test]
    fn test_parse_with_country_code() {
        let phone = PhoneNumber::parse("919876543210").unwrap();
        assert_eq!(phone.as_str(), "+919876543210");
    }

    #[test]
    fn test_parse_with_trunk_prefix() {
        let phone = PhoneNumber::parse("09876543210").unwrap();
        assert_eq!(phone.as_str(), "+919876543210");
    }

    #[test]
    fn test_parse_strips_punctuation() {
        let phone = PhoneNumber::parse("+91 98765-43210").unwrap();
        assert_eq!(phone.as_str(), "+919876543210");
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(PhoneNumber::parse("---"), Err(PhoneError::Empty)));
    }

    #[test]
    fn test_parse_wrong_lengths() {
        assert!(matches!(
            PhoneNumber::parse("987654321"),
            Err(PhoneError::UnrecognizedFormat { digits: 9 })
        ));
        assert!(matches!(
            PhoneNumber::parse("98765432101"),
            Err(PhoneError::UnrecognizedFormat { digits: 11 })
        ));
    }

    #[test]
    fn test_parse_national_strict() {
        assert!(PhoneNumber::parse_national("9876543210").is_ok());
        assert!(matches!(
            PhoneNumber::parse_national("987654321"),
            Err(PhoneError::NotTenDigits)
        ));
        assert!(matches!(
            PhoneNumber::parse_national("98765432101"),
            Err(PhoneError::NotTenDigits)
        ));
        // parse() would accept these; the sign-in form must not.
        assert!(matches!(
            PhoneNumber::parse_national("919876543210"),
            Err(PhoneError::NotTenDigits)
        ));
        assert!(matches!(
            PhoneNumber::parse_national("98765 4321"),
            Err(PhoneError::NotTenDigits)
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let phone = PhoneNumber::parse("9876543210").unwrap();
        let json = serde_json::to_string(&phone).unwrap();
        assert_eq!(json, "\"+919876543210\"");

        let parsed: PhoneNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, phone);
    }
}
