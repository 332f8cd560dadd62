//! Shared newtypes.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected certificate common name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid certificate name '{name}': {reason}")]
pub struct InvalidCertificateName {
    pub name: String,
    pub reason: &'static str,
}

/// A certificate common name (CN), also used as the VPN client name.
///
/// Only `[A-Za-z0-9._-]` is accepted: the name ends up inside a shell
/// command line and inside artifact file names under `keys/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CertificateName(String);

impl CertificateName {
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidCertificateName> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("name is empty")
        } else if name.starts_with('.') {
            Some("name must not start with '.'")
        } else if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            Some("only ASCII letters, digits, '.', '_' and '-' are allowed")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(InvalidCertificateName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CertificateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for CertificateName {
    type Error = InvalidCertificateName;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for CertificateName {
    type Error = InvalidCertificateName;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CertificateName> for String {
    fn from(name: CertificateName) -> Self {
        name.0
    }
}

impl AsRef<str> for CertificateName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("alice")]
    #[case("office-router_2")]
    #[case("host.example")]
    fn accepts_plain_names(#[case] name: &str) {
        let cn = CertificateName::new(name).expect("valid");
        assert_eq!(cn.as_str(), name);
        assert_eq!(cn.to_string(), name);
    }

    #[rstest]
    #[case("")]
    #[case(".hidden")]
    #[case("alice; rm -rf /")]
    #[case("../etc/passwd")]
    #[case("иван")]
    fn rejects_unsafe_names(#[case] name: &str) {
        let err = CertificateName::new(name).unwrap_err();
        assert_eq!(err.name, name);
    }

    #[test]
    fn serde_goes_through_validation() {
        let ok: CertificateName = serde_yaml::from_str("bob").expect("deserialize");
        assert_eq!(ok.as_str(), "bob");
        assert!(serde_yaml::from_str::<CertificateName>("'a b'").is_err());
    }
}
