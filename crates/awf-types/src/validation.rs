//! Input validation utilities

use crate::error::{CommonError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

static ENV_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// IP literal validation with family awareness
pub struct IpValidator;

impl IpValidator {
    /// Validate an IP literal of either family
    pub fn validate(ip: &str) -> Result<IpAddr> {
        let addr = ip.trim().parse::<IpAddr>().map_err(|_| {
            CommonError::Validation(format!("invalid IP address literal: {}", ip))
        })?;

        if addr.is_unspecified() {
            return Err(CommonError::Validation(
                "cannot use the unspecified address (0.0.0.0 or ::)".to_string(),
            ));
        }

        if addr.is_multicast() {
            return Err(CommonError::Validation(
                "cannot use a multicast address".to_string(),
            ));
        }

        Ok(addr)
    }

    /// Validate an IPv4 literal
    pub fn validate_v4(ip: &str) -> Result<Ipv4Addr> {
        match Self::validate(ip)? {
            IpAddr::V4(v4) => Ok(v4),
            IpAddr::V6(_) => Err(CommonError::Validation(format!(
                "expected an IPv4 literal, got {}",
                ip
            ))),
        }
    }

    /// Validate an IPv6 literal
    pub fn validate_v6(ip: &str) -> Result<Ipv6Addr> {
        match Self::validate(ip)? {
            IpAddr::V6(v6) => Ok(v6),
            IpAddr::V4(_) => Err(CommonError::Validation(format!(
                "expected an IPv6 literal, got {}",
                ip
            ))),
        }
    }
}

/// Port and port-range validation
pub struct PortValidator;

impl PortValidator {
    /// Validate a single port number
    pub fn validate(port: u16) -> Result<()> {
        if port == 0 {
            return Err(CommonError::Validation(
                "port number cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate an inclusive port range
    pub fn validate_range(start: u16, end: u16) -> Result<()> {
        if start == 0 || end == 0 {
            return Err(CommonError::Validation(
                "port numbers cannot be 0".to_string(),
            ));
        }

        if start > end {
            return Err(CommonError::Validation(format!(
                "invalid port range: {} is greater than {}",
                start, end
            )));
        }

        Ok(())
    }
}

/// Environment variable name validation
pub struct EnvVarValidator;

impl EnvVarValidator {
    /// Validate an environment variable name
    pub fn validate_name(name: &str) -> Result<()> {
        if !ENV_NAME_PATTERN.is_match(name) {
            return Err(CommonError::Validation(format!(
                "invalid environment variable name: {}",
                name
            )));
        }
        Ok(())
    }

    /// Split a `KEY=VALUE` assignment, validating the key
    pub fn split_assignment(spec: &str) -> Result<(String, String)> {
        let (key, value) = spec.split_once('=').ok_or_else(|| {
            CommonError::Validation(format!("expected KEY=VALUE, got: {}", spec))
        })?;
        Self::validate_name(key)?;
        Ok((key.to_string(), value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_validation() {
        assert!(IpValidator::validate("8.8.8.8").is_ok());
        assert!(IpValidator::validate("2001:4860:4860::8888").is_ok());
        assert!(IpValidator::validate("0.0.0.0").is_err());
        assert!(IpValidator::validate("::").is_err());
        assert!(IpValidator::validate("not-an-ip").is_err());
        assert!(IpValidator::validate("999.1.1.1").is_err());
    }

    #[test]
    fn test_ip_family_split() {
        assert!(IpValidator::validate_v4("1.1.1.1").is_ok());
        assert!(IpValidator::validate_v4("2606:4700::1111").is_err());
        assert!(IpValidator::validate_v6("2606:4700::1111").is_ok());
        assert!(IpValidator::validate_v6("1.1.1.1").is_err());
    }

    #[test]
    fn test_port_range_validation() {
        assert!(PortValidator::validate_range(3000, 10000).is_ok());
        assert!(PortValidator::validate_range(8080, 8080).is_ok());
        assert!(PortValidator::validate_range(0, 80).is_err());
        assert!(PortValidator::validate_range(90, 80).is_err());
    }

    #[test]
    fn test_env_var_names() {
        assert!(EnvVarValidator::validate_name("GITHUB_TOKEN").is_ok());
        assert!(EnvVarValidator::validate_name("_private").is_ok());
        assert!(EnvVarValidator::validate_name("9BAD").is_err());
        assert!(EnvVarValidator::validate_name("BAD-NAME").is_err());
    }

    #[test]
    fn test_env_assignment() {
        let (k, v) = EnvVarValidator::split_assignment("FOO=bar=baz").unwrap();
        assert_eq!(k, "FOO");
        assert_eq!(v, "bar=baz");
        assert!(EnvVarValidator::split_assignment("NOVALUE").is_err());
    }
}
