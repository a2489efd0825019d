#![forbid(unsafe_code)]

//! Behavior switches for lists and groups.
//!
//! Both configs default to the historical behavior. Each can also be read
//! from the environment:
//!
//! | Variable              | Values                      | Default          |
//! |-----------------------|-----------------------------|------------------|
//! | `LOCKSTEP_REENTRANCY` | `listener-count`, `strict`  | `listener-count` |
//! | `LOCKSTEP_REPLACE`    | `append`, `in-place`        | `append`         |
//!
//! Unrecognized values are ignored and the default is kept.

/// Environment variable selecting [`ReentrancyPolicy`].
pub const REENTRANCY_ENV: &str = "LOCKSTEP_REENTRANCY";

/// Environment variable selecting [`ReplacePolicy`].
pub const REPLACE_ENV: &str = "LOCKSTEP_REPLACE";

#[inline]
fn normalize(value: &str) -> String {
    value.trim().to_ascii_lowercase().replace('_', "-")
}

/// When a mutation issued during notification dispatch is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReentrancyPolicy {
    /// Reject only while more than one listener is attached.
    #[default]
    ListenerCount,
    /// Reject every nested mutation.
    Strict,
}

impl ReentrancyPolicy {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "listener-count" | "default" => Some(Self::ListenerCount),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

/// How a group applies a member's `Replace` to the other members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplacePolicy {
    /// Append the new item to each peer; the old item stays.
    #[default]
    AppendNew,
    /// Overwrite the peer element at the replaced index.
    InPlace,
}

impl ReplacePolicy {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "append" | "append-new" => Some(Self::AppendNew),
            "in-place" | "inplace" => Some(Self::InPlace),
            _ => None,
        }
    }
}

/// Configuration for a [`NotifyingList`](crate::NotifyingList).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListConfig {
    pub reentrancy: ReentrancyPolicy,
}

impl ListConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reentrancy: ReentrancyPolicy::ListenerCount,
        }
    }

    #[must_use]
    pub fn with_reentrancy(mut self, policy: ReentrancyPolicy) -> Self {
        self.reentrancy = policy;
        self
    }

    /// Read overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read overrides through a custom environment lookup.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();
        if let Some(policy) = get_env(REENTRANCY_ENV).as_deref().and_then(ReentrancyPolicy::parse) {
            config.reentrancy = policy;
        }
        config
    }
}

/// Configuration for a [`SyncGroup`](crate::SyncGroup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupConfig {
    pub replace: ReplacePolicy,
}

impl GroupConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            replace: ReplacePolicy::AppendNew,
        }
    }

    #[must_use]
    pub fn with_replace(mut self, policy: ReplacePolicy) -> Self {
        self.replace = policy;
        self
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();
        if let Some(policy) = get_env(REPLACE_ENV).as_deref().and_then(ReplacePolicy::parse) {
            config.replace = policy;
        }
        config
    }
}
