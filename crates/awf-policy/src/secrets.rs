//! One-shot secret environment variables
//!
//! The names here are configuration, not code: the default list may be
//! extended by the caller. Values never pass through this module.

use awf_types::{EnvVarValidator, ENV_ONE_SHOT_SKIP_UNSET};
use serde::{Deserialize, Serialize};

/// Secret-bearing variable names handed to the preload shim by default.
pub const DEFAULT_SECRET_ENV_VARS: &[&str] = &[
    "GITHUB_TOKEN",
    "GITHUB_PERSONAL_ACCESS_TOKEN",
    "COPILOT_GITHUB_TOKEN",
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
];

/// Name of the variable the preload shim reads for caller extensions.
pub const ENV_ONE_SHOT_VARS: &str = "AWF_ONE_SHOT_VARS";

/// The set of environment variable names subject to one-shot handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretEnvPolicy {
    names: Vec<String>,
}

impl Default for SecretEnvPolicy {
    fn default() -> Self {
        Self {
            names: DEFAULT_SECRET_ENV_VARS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SecretEnvPolicy {
    /// Extend the default list with additional names; invalid names are
    /// rejected by the validator, duplicates are ignored.
    pub fn extend<I, S>(&mut self, names: I) -> awf_types::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            EnvVarValidator::validate_name(name)?;
            if !self.names.iter().any(|n| n == name) {
                self.names.push(name.to_string());
            }
        }
        Ok(())
    }

    pub fn is_secret(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Environment assignments the agent container needs so the preload shim
    /// sees the same configuration as this policy: the extension list, and
    /// the skip-unset passthrough when the operator requested it.
    pub fn shim_environment(&self) -> Vec<(String, String)> {
        let mut env = Vec::new();
        let extras: Vec<&str> = self
            .names
            .iter()
            .map(|s| s.as_str())
            .filter(|n| !DEFAULT_SECRET_ENV_VARS.contains(n))
            .collect();
        if !extras.is_empty() {
            env.push((ENV_ONE_SHOT_VARS.to_string(), extras.join(",")));
        }
        if std::env::var(ENV_ONE_SHOT_SKIP_UNSET).as_deref() == Ok("1") {
            env.push((ENV_ONE_SHOT_SKIP_UNSET.to_string(), "1".to_string()));
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_list() {
        let policy = SecretEnvPolicy::default();
        assert!(policy.is_secret("GITHUB_TOKEN"));
        assert!(policy.is_secret("ANTHROPIC_API_KEY"));
        assert!(!policy.is_secret("PATH"));
    }

    #[test]
    fn test_extension_dedupes_and_validates() {
        let mut policy = SecretEnvPolicy::default();
        policy.extend(["MY_TOKEN", "GITHUB_TOKEN", "MY_TOKEN"]).unwrap();
        assert!(policy.is_secret("MY_TOKEN"));
        assert_eq!(
            policy.names().len(),
            DEFAULT_SECRET_ENV_VARS.len() + 1
        );
        assert!(policy.extend(["BAD-NAME"]).is_err());
    }

    #[test]
    fn test_shim_environment_carries_extras_only() {
        let mut policy = SecretEnvPolicy::default();
        assert!(policy
            .shim_environment()
            .iter()
            .all(|(k, _)| k != ENV_ONE_SHOT_VARS));
        policy.extend(["EXTRA_TOKEN"]).unwrap();
        let env = policy.shim_environment();
        assert!(env
            .iter()
            .any(|(k, v)| k == ENV_ONE_SHOT_VARS && v == "EXTRA_TOKEN"));
    }
}
