//! Engine configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};

use rainshield_common::{
    Identity, RainshieldError, BPS_DENOMINATOR, DEFAULT_FEE_RATE_BPS, HUMIDITY_TOLERANCE_PCT,
    RAINFALL_TOLERANCE_MM, TEMPERATURE_TOLERANCE_C,
};

/// Engine configuration passed into [`crate::InsuranceEngine::new`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Share of every premium forwarded to the fee recipient
    pub fee_rate_bps: u64,
    /// Receives protocol fees
    pub fee_recipient: Identity,
    /// Custody account holding the reserves of every pool
    pub treasury: Identity,
    /// May revoke oracles; revocation is disabled when unset
    pub admin: Option<Identity>,
    /// Verification tolerances
    pub tolerance: ToleranceSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fee_rate_bps: DEFAULT_FEE_RATE_BPS,
            fee_recipient: Identity::from("rainshield-fees"),
            treasury: Identity::from("rainshield-treasury"),
            admin: None,
            tolerance: ToleranceSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment and `.env`
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Ok(val) = std::env::var("RAINSHIELD_FEE_RATE_BPS") {
            cfg.fee_rate_bps = val.parse()?;
        }
        if let Ok(val) = std::env::var("RAINSHIELD_FEE_RECIPIENT") {
            cfg.fee_recipient = Identity::new(val);
        }
        if let Ok(val) = std::env::var("RAINSHIELD_TREASURY") {
            cfg.treasury = Identity::new(val);
        }
        if let Ok(val) = std::env::var("RAINSHIELD_ADMIN") {
            cfg.admin = Some(Identity::new(val));
        }

        // Tolerance settings
        if let Ok(val) = std::env::var("RAINSHIELD_TOLERANCE_RAINFALL") {
            cfg.tolerance.rainfall = val.parse()?;
        }
        if let Ok(val) = std::env::var("RAINSHIELD_TOLERANCE_TEMPERATURE") {
            cfg.tolerance.temperature = val.parse()?;
        }
        if let Ok(val) = std::env::var("RAINSHIELD_TOLERANCE_HUMIDITY") {
            cfg.tolerance.humidity = val.parse()?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> std::result::Result<(), RainshieldError> {
        if self.fee_rate_bps > BPS_DENOMINATOR {
            return Err(RainshieldError::Config(format!(
                "fee_rate_bps {} exceeds {}",
                self.fee_rate_bps, BPS_DENOMINATOR
            )));
        }
        if self.treasury == self.fee_recipient {
            return Err(RainshieldError::Config(
                "treasury and fee_recipient must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Maximum distance between a verification and the stored observation
///
/// Each margin is strict: a difference equal to the margin is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToleranceSettings {
    /// Rainfall margin in mm
    pub rainfall: u64,
    /// Temperature margin in °C
    pub temperature: u64,
    /// Humidity margin in percentage points
    pub humidity: u64,
}

impl Default for ToleranceSettings {
    fn default() -> Self {
        Self {
            rainfall: RAINFALL_TOLERANCE_MM,
            temperature: TEMPERATURE_TOLERANCE_C,
            humidity: HUMIDITY_TOLERANCE_PCT,
        }
    }
}
