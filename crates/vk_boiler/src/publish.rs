//! Artifact repository credentials

use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable holding the deployment username
pub const USERNAME_ENV_VAR: &str = "BOILER_DEPLOY_USERNAME";
/// Environment variable holding the deployment password
pub const PASSWORD_ENV_VAR: &str = "BOILER_DEPLOY_PASSWORD";

/// How to authenticate against the artifact repository
#[derive(Clone, PartialEq, Eq)]
pub enum DeploymentCredentials {
    /// Username and password taken from the environment
    Basic {
        /// Repository username
        username: String,
        /// Repository password
        password: String,
    },
    /// Left to whatever credential mechanism the publishing tool has
    External,
}

impl DeploymentCredentials {
    /// Read credentials from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials from an arbitrary variable source.
    ///
    /// Both variables must be present and non-empty, otherwise the external
    /// mechanism is used. Missing credentials are never an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());
        match (non_empty(USERNAME_ENV_VAR), non_empty(PASSWORD_ENV_VAR)) {
            (Some(username), Some(password)) => Self::Basic { username, password },
            _ => {
                log::debug!(
                    "{} / {} not both set, deferring to external credentials",
                    USERNAME_ENV_VAR,
                    PASSWORD_ENV_VAR
                );
                Self::External
            }
        }
    }

    /// Whether credentials came from the environment
    pub const fn is_basic(&self) -> bool {
        matches!(self, Self::Basic { .. })
    }
}

impl fmt::Debug for DeploymentCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::External => f.write_str("External"),
        }
    }
}

/// Remote artifact endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishTarget {
    /// Repository URL
    pub url: String,
    /// Credentials are resolved at use time and never stored in config
    #[serde(skip, default = "external_credentials")]
    pub credentials: DeploymentCredentials,
}

const fn external_credentials() -> DeploymentCredentials {
    DeploymentCredentials::External
}

impl PublishTarget {
    /// Target with credentials resolved from the environment
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: DeploymentCredentials::from_env(),
        }
    }

    /// Re-read credentials from the environment
    pub fn with_env_credentials(mut self) -> Self {
        self.credentials = DeploymentCredentials::from_env();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_both_variables_give_basic() {
        let credentials = DeploymentCredentials::from_lookup(lookup(&[
            (USERNAME_ENV_VAR, "deployer"),
            (PASSWORD_ENV_VAR, "hunter2"),
        ]));
        assert_eq!(
            credentials,
            DeploymentCredentials::Basic {
                username: "deployer".to_string(),
                password: "hunter2".to_string(),
            }
        );
    }

    #[test]
    fn test_partial_variables_fall_back() {
        let credentials = DeploymentCredentials::from_lookup(lookup(&[(USERNAME_ENV_VAR, "deployer")]));
        assert_eq!(credentials, DeploymentCredentials::External);

        let credentials = DeploymentCredentials::from_lookup(lookup(&[
            (USERNAME_ENV_VAR, "deployer"),
            (PASSWORD_ENV_VAR, ""),
        ]));
        assert!(!credentials.is_basic());
    }

    #[test]
    fn test_debug_hides_password() {
        let credentials = DeploymentCredentials::Basic {
            username: "deployer".to_string(),
            password: "hunter2".to_string(),
        };
        let printed = format!("{credentials:?}");
        assert!(printed.contains("deployer"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_target_config_never_contains_credentials() {
        let target = PublishTarget {
            url: "https://repo.example.org/releases".to_string(),
            credentials: DeploymentCredentials::Basic {
                username: "deployer".to_string(),
                password: "hunter2".to_string(),
            },
        };
        let text = toml::to_string(&target).unwrap();
        assert!(!text.contains("hunter2"));

        let parsed: PublishTarget = toml::from_str(&text).unwrap();
        assert_eq!(parsed.url, target.url);
        assert_eq!(parsed.credentials, DeploymentCredentials::External);
    }
}
