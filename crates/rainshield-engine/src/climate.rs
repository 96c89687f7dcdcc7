//! Climate ledger - weather observations keyed by (region, height)
//!
//! Submission is last-writer-wins on the exact key. Verification attests an
//! existing record: it flips `verified` and never rewrites the numbers.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use rainshield_common::numeric::within_tolerance;
use rainshield_common::{Height, Identity, NotFoundError, Region, Result, StateConflictError};

use crate::config::ToleranceSettings;

/// A weather observation reported by an oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub region: Region,
    pub height: Height,
    /// Rainfall in mm
    pub rainfall: i64,
    /// Temperature in °C
    pub temperature: i64,
    /// Relative humidity in %
    pub humidity: u64,
    pub submitter: Identity,
    pub verified: bool,
}

impl Observation {
    /// blake3 digest over the canonical fields, hex encoded
    ///
    /// `verified` is excluded so attestation does not change the digest.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.region.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(&self.height.to_le_bytes());
        hasher.update(&self.rainfall.to_le_bytes());
        hasher.update(&self.temperature.to_le_bytes());
        hasher.update(&self.humidity.to_le_bytes());
        hasher.update(self.submitter.as_str().as_bytes());
        hex::encode(hasher.finalize().as_bytes())
    }

    pub fn to_ref(&self) -> ObservationRef {
        ObservationRef {
            region: self.region.clone(),
            height: self.height,
            digest: self.digest(),
        }
    }
}

/// Handle to a stored observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationRef {
    pub region: Region,
    pub height: Height,
    pub digest: String,
}

/// Readings a verifier claims to have observed independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub rainfall: i64,
    pub temperature: i64,
    pub humidity: u64,
}

/// Observations indexed per region by height
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClimateLedger {
    by_region: HashMap<Region, BTreeMap<Height, Observation>>,
}

impl ClimateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an unverified observation, replacing an unverified record at the same key
    ///
    /// Verified records are final. Callers must have checked that `submitter`
    /// is an approved oracle.
    pub fn submit(
        &mut self,
        region: Region,
        height: Height,
        reading: Reading,
        submitter: Identity,
    ) -> Result<ObservationRef> {
        if self.latest(&region, height).is_some_and(|o| o.verified) {
            return Err(StateConflictError::ObservationFinalized {
                region: region.to_string(),
                height,
            }
            .into());
        }

        let observation = Observation {
            region: region.clone(),
            height,
            rainfall: reading.rainfall,
            temperature: reading.temperature,
            humidity: reading.humidity,
            submitter,
            verified: false,
        };
        let obs_ref = observation.to_ref();
        self.by_region
            .entry(region)
            .or_default()
            .insert(height, observation);
        Ok(obs_ref)
    }

    /// Check a verifier's readings against the stored record without mutating it
    ///
    /// Callers must have checked that `verifier` is an approved oracle.
    pub fn check_verification(
        &self,
        region: &Region,
        height: Height,
        reading: &Reading,
        verifier: &Identity,
        tolerance: &ToleranceSettings,
    ) -> Result<&Observation> {
        let stored = self
            .latest(region, height)
            .ok_or_else(|| NotFoundError::Observation {
                region: region.to_string(),
                height,
            })?;

        if &stored.submitter == verifier {
            return Err(StateConflictError::SelfVerification(verifier.to_string()).into());
        }

        let checks = [
            (
                "rainfall",
                reading.rainfall.abs_diff(stored.rainfall),
                tolerance.rainfall,
            ),
            (
                "temperature",
                reading.temperature.abs_diff(stored.temperature),
                tolerance.temperature,
            ),
            (
                "humidity",
                reading.humidity.abs_diff(stored.humidity),
                tolerance.humidity,
            ),
        ];
        for (field, difference, margin) in checks {
            if !within_tolerance(difference, margin) {
                return Err(StateConflictError::ToleranceExceeded {
                    field,
                    difference,
                    tolerance: margin,
                }
                .into());
            }
        }

        Ok(stored)
    }

    /// Verify and mark the observation attested
    pub fn verify(
        &mut self,
        region: &Region,
        height: Height,
        reading: &Reading,
        verifier: &Identity,
        tolerance: &ToleranceSettings,
    ) -> Result<ObservationRef> {
        self.check_verification(region, height, reading, verifier, tolerance)?;

        let stored = self
            .by_region
            .get_mut(region)
            .and_then(|heights| heights.get_mut(&height))
            .ok_or_else(|| NotFoundError::Observation {
                region: region.to_string(),
                height,
            })?;
        stored.verified = true;
        Ok(stored.to_ref())
    }

    /// Exact-key lookup; older heights are never consulted
    pub fn latest(&self, region: &Region, height: Height) -> Option<&Observation> {
        self.by_region
            .get(region)
            .and_then(|heights| heights.get(&height))
    }

    /// Most recent observation at or before `height`
    pub fn most_recent(&self, region: &Region, height: Height) -> Option<&Observation> {
        self.by_region
            .get(region)
            .and_then(|heights| heights.range(..=height).next_back())
            .map(|(_, obs)| obs)
    }

    pub fn len(&self) -> usize {
        self.by_region.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rainshield_common::RainshieldError;

    fn region() -> Region {
        Region::new("sahel-north").unwrap()
    }

    fn reading(rainfall: i64, temperature: i64, humidity: u64) -> Reading {
        Reading {
            rainfall,
            temperature,
            humidity,
        }
    }

    fn ledger_with(rainfall: i64) -> ClimateLedger {
        let mut ledger = ClimateLedger::new();
        ledger
            .submit(region(), 100, reading(rainfall, 20, 60), Identity::from("a"))
            .unwrap();
        ledger
    }

    #[test]
    fn test_submit_overwrites_same_key() {
        let mut ledger = ledger_with(200);
        let first = ledger.latest(&region(), 100).unwrap().digest();

        ledger
            .submit(region(), 100, reading(150, 20, 60), Identity::from("b"))
            .unwrap();
        let stored = ledger.latest(&region(), 100).unwrap();
        assert_eq!(stored.rainfall, 150);
        assert_eq!(stored.submitter, Identity::from("b"));
        assert_ne!(stored.digest(), first);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_verified_observation_is_final() {
        let mut ledger = ledger_with(200);
        ledger
            .verify(&region(), 100, &reading(201, 20, 60), &Identity::from("b"), &ToleranceSettings::default())
            .unwrap();

        let result = ledger.submit(region(), 100, reading(10, 20, 60), Identity::from("b"));
        assert!(matches!(
            result,
            Err(RainshieldError::StateConflict(StateConflictError::ObservationFinalized { height: 100, .. }))
        ));
        let stored = ledger.latest(&region(), 100).unwrap();
        assert!(stored.verified);
        assert_eq!(stored.rainfall, 200);

        // other heights stay open
        assert!(ledger.submit(region(), 101, reading(10, 20, 60), Identity::from("b")).is_ok());
    }

    #[test]
    fn test_verify_within_tolerance() {
        let mut ledger = ledger_with(200);
        let tol = ToleranceSettings::default();

        ledger
            .verify(&region(), 100, &reading(204, 21, 64), &Identity::from("b"), &tol)
            .unwrap();

        let stored = ledger.latest(&region(), 100).unwrap();
        assert!(stored.verified);
        assert_eq!(stored.rainfall, 200);
        assert_eq!(stored.temperature, 20);
    }

    #[test]
    fn test_verify_boundary_is_rejected() {
        let ledger = ledger_with(200);
        let tol = ToleranceSettings::default();

        let result =
            ledger.check_verification(&region(), 100, &reading(205, 20, 60), &Identity::from("b"), &tol);
        assert_eq!(
            result.unwrap_err(),
            RainshieldError::StateConflict(StateConflictError::ToleranceExceeded {
                field: "rainfall",
                difference: 5,
                tolerance: 5,
            })
        );

        let result =
            ledger.check_verification(&region(), 100, &reading(200, 18, 60), &Identity::from("b"), &tol);
        assert!(matches!(
            result,
            Err(RainshieldError::StateConflict(StateConflictError::ToleranceExceeded { field: "temperature", .. }))
        ));
    }

    #[test]
    fn test_self_verification_rejected() {
        let mut ledger = ledger_with(200);
        let result = ledger.verify(
            &region(),
            100,
            &reading(200, 20, 60),
            &Identity::from("a"),
            &ToleranceSettings::default(),
        );
        assert!(matches!(
            result,
            Err(RainshieldError::StateConflict(StateConflictError::SelfVerification(_)))
        ));
        assert!(!ledger.latest(&region(), 100).unwrap().verified);
    }

    #[test]
    fn test_verify_missing() {
        let mut ledger = ledger_with(200);
        let result = ledger.verify(
            &region(),
            101,
            &reading(200, 20, 60),
            &Identity::from("b"),
            &ToleranceSettings::default(),
        );
        assert!(matches!(result, Err(RainshieldError::NotFound(_))));
    }

    #[test]
    fn test_exact_and_most_recent_lookup() {
        let mut ledger = ledger_with(200);
        ledger
            .submit(region(), 140, reading(90, 20, 60), Identity::from("a"))
            .unwrap();

        assert!(ledger.latest(&region(), 120).is_none());
        assert_eq!(ledger.most_recent(&region(), 120).unwrap().height, 100);
        assert_eq!(ledger.most_recent(&region(), 500).unwrap().height, 140);
        assert!(ledger.most_recent(&region(), 99).is_none());
    }

    #[test]
    fn test_digest_ignores_verified_flag() {
        let mut ledger = ledger_with(200);
        let before = ledger.latest(&region(), 100).unwrap().digest();
        ledger
            .verify(&region(), 100, &reading(201, 20, 60), &Identity::from("b"), &ToleranceSettings::default())
            .unwrap();
        assert_eq!(ledger.latest(&region(), 100).unwrap().digest(), before);
    }
}
