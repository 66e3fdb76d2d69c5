//! Validated dSUID identifier.
//!
//! A dSUID is the stable identity of every entity in the digitalSTROM
//! ecosystem: hosts, vDCs, devices, and the peer vdSM. On the wire it is a
//! string of exactly 34 hexadecimal characters. Comparison is
//! case-insensitive, but the original spelling is preserved so frames echo
//! identifiers exactly as configured.

use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use crate::error::{ProtocolError, Result};

/// A validated 34-hex-character dSUID.
///
/// Construction validates length and character set; a [`Dsuid`] in hand is
/// always well-formed. Equality and hashing ignore ASCII case, so registry
/// lookups match regardless of how the peer spells the identifier.
#[derive(Debug, Clone)]
pub struct Dsuid(String);

impl Dsuid {
    /// Required identifier length in characters.
    pub const LEN: usize = 34;

    /// Validate and wrap a dSUID.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidDsuid`] if the input is not exactly 34
    ///   ASCII hex characters
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();

        if value.len() != Self::LEN {
            return Err(ProtocolError::InvalidDsuid {
                value,
                reason: "expected exactly 34 characters",
            });
        }

        if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ProtocolError::InvalidDsuid {
                value,
                reason: "expected hexadecimal characters only",
            });
        }

        Ok(Self(value))
    }

    /// The identifier as received, original case preserved.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Dsuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Dsuid {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Dsuid {
    type Error = ProtocolError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl AsRef<str> for Dsuid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Dsuid {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Dsuid {}

impl Hash for Dsuid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}
