use gymnasium::{Discrete, GymError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The environment handed back something outside its own contract.
    /// Fatal: the run is aborted.
    #[error("environment protocol violation: {0}")]
    EnvironmentProtocolViolation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Gym(#[from] GymError),

    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub fn state_out_of_range(s: Discrete, n_s: usize) -> Self {
        Self::EnvironmentProtocolViolation(format!("state {s} is outside [0, {n_s})"))
    }

    pub fn action_out_of_range(a: Discrete, n_a: usize) -> Self {
        Self::EnvironmentProtocolViolation(format!("action {a} is outside [0, {n_a})"))
    }
}

/// Checks that `s` addresses one of `n_s` states.
pub fn check_state(s: Discrete, n_s: usize) -> Result<Discrete> {
    if s >= 0 && (s as usize) < n_s {
        Ok(s)
    } else {
        Err(AgentError::state_out_of_range(s, n_s))
    }
}

/// Checks that `a` addresses one of `n_a` actions.
pub fn check_action(a: Discrete, n_a: usize) -> Result<Discrete> {
    if a >= 0 && (a as usize) < n_a {
        Ok(a)
    } else {
        Err(AgentError::action_out_of_range(a, n_a))
    }
}
