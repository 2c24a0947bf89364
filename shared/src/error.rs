use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{AsRefStr, Display, EnumString};

pub const CONFIGURATION_MISSING_ERROR: &str = "Both an api key and an api secret are required to load the wheel";
pub const INVALID_CONFIGURATION_ERROR: &str = "The wheel configuration failed validation";
pub const NO_APPLICABLE_RULE_ERROR: &str = "No rule matches the configured tag and custom parameter values";
pub const EMPTY_REWARD_POOL_ERROR: &str = "The selected rule has no rewards to put on the wheel";
pub const PLAYER_ID_MISSING_ERROR: &str = "A player id is required before spinning";
pub const NO_REWARD_RESULT_ERROR: &str = "The play action returned no result";
pub const EMPTY_GRANT_EVENTS_ERROR: &str = "The play action returned no reward events";
pub const SPIN_NOT_ACCEPTED_ERROR: &str = "The wheel is not accepting input right now";

/// Every way a wheel session can report a problem.
///
/// None of these are fatal: the session is always left in a defined phase.
/// `SpinNotAccepted` is only ever returned to the caller, the rest are also
/// published on the error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString)]
pub enum SpinErrorKind {
    ConfigurationMissing,
    InvalidConfiguration,
    RuleFetchFailed,
    NoApplicableRule,
    EmptyRewardPool,
    PlayerIdMissing,
    GrantFetchFailed,
    NoRewardResult,
    EmptyGrantEvents,
    UnmatchedGrant,
    InvalidSectionCount,
    InvalidSectionIndex,
    SpinNotAccepted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinError {
    pub kind: SpinErrorKind,
    pub message: String,
}

impl SpinError {
    pub fn new(kind: SpinErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn configuration_missing() -> Self {
        Self::new(SpinErrorKind::ConfigurationMissing, CONFIGURATION_MISSING_ERROR)
    }

    pub fn invalid_configuration(details: &str) -> Self {
        Self::new(
            SpinErrorKind::InvalidConfiguration,
            format!("{}: {}", INVALID_CONFIGURATION_ERROR, details.trim()),
        )
    }

    pub fn rule_fetch_failed(err: &ServiceError) -> Self {
        Self::new(SpinErrorKind::RuleFetchFailed, format!("Failed to fetch rules: {}", err))
    }

    pub fn no_applicable_rule() -> Self {
        Self::new(SpinErrorKind::NoApplicableRule, NO_APPLICABLE_RULE_ERROR)
    }

    pub fn empty_reward_pool() -> Self {
        Self::new(SpinErrorKind::EmptyRewardPool, EMPTY_REWARD_POOL_ERROR)
    }

    pub fn player_id_missing() -> Self {
        Self::new(SpinErrorKind::PlayerIdMissing, PLAYER_ID_MISSING_ERROR)
    }

    pub fn grant_fetch_failed(err: &ServiceError) -> Self {
        Self::new(SpinErrorKind::GrantFetchFailed, format!("Failed to execute play action: {}", err))
    }

    pub fn no_reward_result() -> Self {
        Self::new(SpinErrorKind::NoRewardResult, NO_REWARD_RESULT_ERROR)
    }

    pub fn empty_grant_events() -> Self {
        Self::new(SpinErrorKind::EmptyGrantEvents, EMPTY_GRANT_EVENTS_ERROR)
    }

    pub fn spin_not_accepted() -> Self {
        Self::new(SpinErrorKind::SpinNotAccepted, SPIN_NOT_ACCEPTED_ERROR)
    }

    /// Whether this error goes out on the session's error channel.
    pub fn is_published(&self) -> bool {
        self.kind != SpinErrorKind::SpinNotAccepted
    }
}

impl fmt::Display for SpinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for SpinError {}

/// Failure reported by the rewards service or the transport in front of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    pub code: String,
    pub message: String,
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}
