//! # Rainshield Common
//!
//! Shared types, errors, and numeric utilities for the Rainshield parametric
//! insurance engine.
//!
//! ## Core Types
//!
//! - [`Identity`]: Authenticated participant (holder, oracle, treasury)
//! - [`Region`] / [`CropType`]: Bounded lookup keys for observations and pools
//! - [`OracleName`]: Bounded display name for an oracle registration
//!
//! ## Numeric
//!
//! - [`numeric`]: Basis-point arithmetic for fee splits, refund ratios, and
//!   verification tolerances

pub mod error;
pub mod numeric;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{
    AuthorizationError, ErrorCategory, NotFoundError, RainshieldError, Result, StateConflictError,
    TransferError, ValidationError,
};
pub use numeric::{FeeSplit, BPS_DENOMINATOR};
pub use types::identifiers::{CropType, Identity, OracleName, Region};

/// Rainshield version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Policy identifier, monotonically increasing
pub type PolicyId = u64;

/// Amount of value in the host ledger's smallest unit
pub type Amount = u64;

/// Logical clock supplied by the host ledger
pub type Height = u64;

/// Minimum coverage window in heights
pub const MIN_COVERAGE_DURATION: u64 = 1000;

/// Frost thresholds must stay strictly below this temperature (°C)
pub const FROST_THRESHOLD_CEILING: i64 = 30;

/// Reserve target assigned to newly created pools (70%)
pub const DEFAULT_RESERVE_TARGET_BPS: u64 = 7000;

/// Default protocol fee taken from each premium (2%)
pub const DEFAULT_FEE_RATE_BPS: u64 = 200;

/// Maximum region length in bytes
pub const MAX_REGION_LEN: usize = 50;

/// Maximum crop type length in bytes
pub const MAX_CROP_TYPE_LEN: usize = 20;

/// Maximum oracle display name length in bytes
pub const MAX_ORACLE_NAME_LEN: usize = 50;

/// Identifier assigned to the first policy
pub const FIRST_POLICY_ID: PolicyId = 1;

/// Verification must differ from the stored rainfall by less than this (mm)
pub const RAINFALL_TOLERANCE_MM: u64 = 5;

/// Verification must differ from the stored temperature by less than this (°C)
pub const TEMPERATURE_TOLERANCE_C: u64 = 2;

/// Verification must differ from the stored humidity by less than this (%)
pub const HUMIDITY_TOLERANCE_PCT: u64 = 5;
