//! # Rainshield Engine
//!
//! Parametric crop insurance: coverage contracts indexed by region and crop,
//! fed by oracle weather observations, paid out automatically when an
//! observation crosses a policy threshold.
//!
//! ## Components
//!
//! - **Oracle Registry**: Which identities may submit and verify observations
//! - **Climate Ledger**: Observations keyed by (region, height)
//! - **Risk Pools**: Per-crop reserve with premium, payout, and refund accounting
//! - **Policy Store**: Coverage contracts and their lifecycle
//! - **Trigger Engine**: Threshold evaluation and payout execution
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     InsuranceEngine                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐ │
//! │  │   Oracle    │  │   Climate   │  │   Trigger Engine    │ │
//! │  │  Registry   │──│   Ledger    │──│  (on submission or  │ │
//! │  │             │  │             │  │   manual evaluate)  │ │
//! │  └─────────────┘  └─────────────┘  └──────────┬──────────┘ │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────┴──────────┐ │
//! │  │   Policy    │──│  Risk Pool  │──│     Settlement      │ │
//! │  │    Store    │  │    Book     │  │  (HostLedger seam)  │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod climate;
pub mod config;
pub mod engine;
pub mod host;
pub mod journal;
pub mod oracle;
pub mod policy;
pub mod pool;
pub mod settlement;
pub mod trigger;

pub use climate::{ClimateLedger, Observation, ObservationRef, Reading};
pub use config::{EngineConfig, ToleranceSettings};
pub use engine::{
    DeferredPayout, EngineSnapshot, InsuranceEngine, InvariantViolation, Payout, SharedEngine,
    SubmissionReceipt,
};
pub use host::{HostLedger, InMemoryLedger};
pub use journal::{EngineEvent, Journal, JournalEntry};
pub use oracle::{Allowlist, ApprovalPolicy, OracleRegistration, OracleRegistry, SelfRegistration};
pub use policy::{CoverageRequest, Policy, PolicyStatus, PolicyStore, Thresholds};
pub use pool::{RiskPool, RiskPoolBook};
pub use trigger::TriggerCause;

pub use rainshield_common::{
    Amount, CropType, ErrorCategory, Height, Identity, PolicyId, RainshieldError, Region, Result,
};
