//! Host-gateway port ranges

use crate::error::{PolicyError, Result};
use awf_types::PortValidator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive TCP port range on the host gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPortRange {
    start: u16,
    end: u16,
}

/// Range installed when the localhost keyword is present and the user did not
/// supply an override.
pub const DEFAULT_HOST_PORTS: HostPortRange = HostPortRange {
    start: 3000,
    end: 10000,
};

impl HostPortRange {
    pub fn new(start: u16, end: u16) -> Result<Self> {
        PortValidator::validate_range(start, end)
            .map_err(|_| PolicyError::InvalidPortRange(format!("{}-{}", start, end)))?;
        Ok(Self { start, end })
    }

    /// Parse a single port (`8080`) or a `lo-hi` range (`3000-10000`).
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let (lo, hi) = match spec.split_once('-') {
            Some((lo, hi)) => (lo.trim(), hi.trim()),
            None => (spec, spec),
        };

        let start = lo
            .parse::<u16>()
            .map_err(|_| PolicyError::InvalidPortRange(spec.to_string()))?;
        let end = hi
            .parse::<u16>()
            .map_err(|_| PolicyError::InvalidPortRange(spec.to_string()))?;

        Self::new(start, end)
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && port <= self.end
    }
}

impl fmt::Display for HostPortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_port() {
        let r = HostPortRange::parse("8080").unwrap();
        assert_eq!(r.start(), 8080);
        assert_eq!(r.end(), 8080);
        assert!(r.contains(8080));
        assert!(!r.contains(8081));
    }

    #[test]
    fn test_parse_range() {
        let r = HostPortRange::parse("3000-10000").unwrap();
        assert!(r.contains(3000));
        assert!(r.contains(10000));
        assert!(!r.contains(2999));
        assert!(!r.contains(10001));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(HostPortRange::parse("0").is_err());
        assert!(HostPortRange::parse("10-5").is_err());
        assert!(HostPortRange::parse("1-70000").is_err());
        assert!(HostPortRange::parse("abc").is_err());
        assert!(HostPortRange::parse("").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        assert_eq!(HostPortRange::parse("3000-10000").unwrap().to_string(), "3000-10000");
        assert_eq!(HostPortRange::parse("443").unwrap().to_string(), "443");
    }
}
