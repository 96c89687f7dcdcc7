//! Error types for the Rainshield engine
//!
//! Provides a unified error type and one sub-enum per failure category.
//! Every variant is returned before any state is mutated, except
//! [`TransferError`], which is surfaced after the enclosing operation has
//! been rolled back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Amount, Height, PolicyId};

/// Result type alias using RainshieldError
pub type Result<T> = std::result::Result<T, RainshieldError>;

/// Unified error type for Rainshield operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RainshieldError {
    // Input shape or range errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // Caller may not perform the operation
    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    // Missing policy, observation, pool, or oracle
    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    // Operation conflicts with current state
    #[error("State conflict: {0}")]
    StateConflict(#[from] StateConflictError),

    // Host ledger rejected a value movement
    #[error("Transfer failure: {0}")]
    Transfer(#[from] TransferError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure taxonomy exposed to hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Validation,
    Authorization,
    NotFound,
    StateConflict,
    TransferFailure,
    Internal,
}

impl RainshieldError {
    /// Map this error onto the host-facing taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            RainshieldError::Validation(_) => ErrorCategory::Validation,
            RainshieldError::Authorization(_) => ErrorCategory::Authorization,
            RainshieldError::NotFound(_) => ErrorCategory::NotFound,
            RainshieldError::StateConflict(_) => ErrorCategory::StateConflict,
            RainshieldError::Transfer(_) => ErrorCategory::TransferFailure,
            RainshieldError::Config(_)
            | RainshieldError::Serialization(_)
            | RainshieldError::Internal(_) => ErrorCategory::Internal,
        }
    }
}

/// Input validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Coverage amount must be positive")]
    InvalidCoverageAmount,

    #[error("Premium must be positive")]
    InvalidPremium,

    #[error("Coverage duration too short: {duration} < {minimum}")]
    DurationTooShort { duration: u64, minimum: u64 },

    #[error("Drought threshold must be positive, got {0}")]
    InvalidDroughtThreshold(i64),

    #[error("Excess-rain threshold {excess_rain} must exceed drought threshold {drought}")]
    InvalidExcessRainThreshold { drought: i64, excess_rain: i64 },

    #[error("Frost threshold {frost} must be below {ceiling}")]
    InvalidFrostThreshold { frost: i64, ceiling: i64 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Field {field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("Field {field} too long: {len} > {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Fee rate {0} bps exceeds 10000")]
    InvalidFeeRate(u64),

    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

/// Authorization errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("Oracle is not approved: {0}")]
    OracleNotApproved(String),

    #[error("Oracle registration denied for {0}")]
    RegistrationDenied(String),

    #[error("Caller {caller} is not the holder of policy {policy_id}")]
    NotPolicyHolder { policy_id: PolicyId, caller: String },

    #[error("Caller {caller} is neither holder nor oracle of policy {policy_id}")]
    NotHolderOrOracle { policy_id: PolicyId, caller: String },

    #[error("Caller {0} is not the engine admin")]
    NotAdmin(String),
}

/// Lookup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("Policy not found: {0}")]
    Policy(PolicyId),

    #[error("No observation for region {region} at height {height}")]
    Observation { region: String, height: Height },

    #[error("No weather data for region {region} at height {height}")]
    NoWeatherData { region: String, height: Height },

    #[error("Risk pool not found: {0}")]
    Pool(String),

    #[error("Oracle not registered: {0}")]
    Oracle(String),
}

/// State conflict errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateConflictError {
    #[error("Policy {0} is not active")]
    NotActive(PolicyId),

    #[error("Policy {0} has already been paid out")]
    AlreadyPaid(PolicyId),

    #[error("Policy {policy_id} does not cover height {height}")]
    OutsideCoverageWindow { policy_id: PolicyId, height: Height },

    #[error("Observation for {region} at {height} is verified and cannot be replaced")]
    ObservationFinalized { region: String, height: Height },

    #[error("Verifier {0} submitted the observation")]
    SelfVerification(String),

    #[error("{field} differs by {difference}, tolerance is < {tolerance}")]
    ToleranceExceeded {
        field: &'static str,
        difference: u64,
        tolerance: u64,
    },

    #[error("Insufficient reserve in pool {crop_type}: required {required}, available {available}")]
    InsufficientReserve {
        crop_type: String,
        required: Amount,
        available: Amount,
    },
}

/// Value movement errors reported by the host ledger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("Insufficient funds in {account}: required {required}, available {available}")]
    InsufficientFunds {
        account: String,
        required: Amount,
        available: Amount,
    },

    #[error("Transfer rejected: {0}")]
    Rejected(String),
}

// Implement From for common external error types
impl From<serde_json::Error> for RainshieldError {
    fn from(err: serde_json::Error) -> Self {
        RainshieldError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for RainshieldError {
    fn from(err: anyhow::Error) -> Self {
        RainshieldError::Internal(err.to_string())
    }
}
