use serde::{Deserialize, Serialize};
use std::fmt;

/// Audited institution (school, child center, care home...). Root of the
/// entity tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Institution {
    /// Unique institution code, enforced by the remote system.
    pub code: String,
    pub name: String,
    /// escuela, cdi, hogar, geriatrico or otro.
    pub kind: String,
    pub address: Option<String>,
    pub neighborhood: Option<String>,
    pub district: Option<String>,
    pub active: bool,
}

impl Institution {
    pub fn new(code: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind: kind.into(),
            address: None,
            neighborhood: None,
            district: None,
            active: true,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_neighborhood(mut self, neighborhood: impl Into<String>) -> Self {
        self.neighborhood = Some(neighborhood.into());
        self
    }

    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }
}

impl fmt::Display for Institution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}
