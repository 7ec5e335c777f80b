//! Protocol version carried in the `X-Protocol-Version` header as
//! `major.minor.patch`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl ProtocolVersion {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self { major, minor, patch }
    }
}

/// The version this control plane speaks today.
pub const CURRENT_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(1, 0, 0);

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid protocol version string: {0:?}")]
pub struct ParseProtocolVersionError(pub String);

impl std::str::FromStr for ProtocolVersion {
    type Err = ParseProtocolVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(ParseProtocolVersionError(s.to_string()));
        }
        let mut nums = [0u16; 3];
        for (slot, part) in nums.iter_mut().zip(parts.iter()) {
            *slot = part
                .parse()
                .map_err(|_| ParseProtocolVersionError(s.to_string()))?;
        }
        Ok(ProtocolVersion::new(nums[0], nums[1], nums[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_dotted_triple() {
        assert_eq!(CURRENT_PROTOCOL_VERSION.to_string(), "1.0.0");
    }

    #[test]
    fn round_trips_through_string() {
        let version = ProtocolVersion::new(2, 5, 11);
        let parsed: ProtocolVersion = version.to_string().parse().unwrap();
        assert_eq!(parsed, version);
    }

    #[test]
    fn rejects_malformed_version_string() {
        assert!("1.0".parse::<ProtocolVersion>().is_err());
        assert!("a.b.c".parse::<ProtocolVersion>().is_err());
    }
}
