// ABOUTME: Validated `user@host` SSH target address.
// ABOUTME: Both parts must be non-empty; no port or scheme syntax is accepted.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("target must be in user@host form")]
    MissingSeparator,

    #[error("target user part cannot be empty")]
    EmptyUser,

    #[error("target host part cannot be empty")]
    EmptyHost,
}

/// A remote account to provision, in `user@host` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    user: String,
    host: String,
}

impl Target {
    pub fn parse(value: &str) -> Result<Self, TargetError> {
        let value = value.trim();
        let (user, host) = value.split_once('@').ok_or(TargetError::MissingSeparator)?;

        if user.is_empty() {
            return Err(TargetError::EmptyUser);
        }
        if host.is_empty() {
            return Err(TargetError::EmptyHost);
        }

        Ok(Self {
            user: user.to_string(),
            host: host.to_string(),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.host)
    }
}
