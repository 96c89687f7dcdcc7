//! Trigger engine
//!
//! A payout fires when any one of three independent conditions holds:
//! rainfall below the drought bound, rainfall above the excess-rain bound, or
//! temperature below the frost bound.

use serde::{Deserialize, Serialize};

use rainshield_common::{Height, PolicyId, Region};

use crate::climate::Observation;
use crate::policy::{PolicyStore, Thresholds};

/// Which condition fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerCause {
    Drought,
    ExcessRain,
    Frost,
}

impl std::fmt::Display for TriggerCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerCause::Drought => write!(f, "drought"),
            TriggerCause::ExcessRain => write!(f, "excess_rain"),
            TriggerCause::Frost => write!(f, "frost"),
        }
    }
}

/// First condition breached by `observation`, or `None`
pub fn evaluate(thresholds: &Thresholds, observation: &Observation) -> Option<TriggerCause> {
    if observation.rainfall < thresholds.drought {
        Some(TriggerCause::Drought)
    } else if observation.rainfall > thresholds.excess_rain {
        Some(TriggerCause::ExcessRain)
    } else if observation.temperature < thresholds.frost {
        Some(TriggerCause::Frost)
    } else {
        None
    }
}

/// Policies in `region` that are active, unpaid, and cover `height`
pub fn candidates(store: &PolicyStore, region: &Region, height: Height) -> Vec<PolicyId> {
    store
        .in_region(region)
        .filter(|id| {
            store
                .get(*id)
                .map(|p| p.is_live_at(height))
                .unwrap_or(false)
        })
        .collect()
}
