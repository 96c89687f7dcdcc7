//! Oracle module - who may submit and verify weather observations
//!
//! This module provides:
//! - The registry of oracle registrations and their active flag
//! - Pluggable approval policies deciding who may register

pub mod approval;
pub mod registry;

pub use approval::{Allowlist, ApprovalPolicy, SelfRegistration};
pub use registry::{OracleRegistration, OracleRegistry};
