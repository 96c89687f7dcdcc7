//! Policy store - coverage contracts and their lifecycle
//!
//! A policy starts active and moves exactly once into a terminal state:
//! paid out or cancelled. Terminal policies are kept as an audit record.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use rainshield_common::{
    Amount, CropType, Height, Identity, NotFoundError, PolicyId, Region, Result,
    StateConflictError, ValidationError, FIRST_POLICY_ID, FROST_THRESHOLD_CEILING,
    MIN_COVERAGE_DURATION,
};

/// Weather bounds that trigger a payout when crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Payout if rainfall falls below this (mm)
    pub drought: i64,
    /// Payout if rainfall rises above this (mm)
    pub excess_rain: i64,
    /// Payout if temperature falls below this (°C)
    pub frost: i64,
}

/// Lifecycle state derived from the `active` and `payout_executed` flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Active,
    PaidOut,
    Cancelled,
}

impl std::fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyStatus::Active => write!(f, "active"),
            PolicyStatus::PaidOut => write!(f, "paid_out"),
            PolicyStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A coverage contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub holder: Identity,
    pub region: Region,
    pub crop_type: CropType,
    pub coverage_amount: Amount,
    pub premium: Amount,
    pub start_height: Height,
    pub end_height: Height,
    pub active: bool,
    pub payout_executed: bool,
    /// Oracle linked to this policy; may trigger manual evaluation
    pub oracle: Identity,
    pub thresholds: Thresholds,
}

impl Policy {
    pub fn status(&self) -> PolicyStatus {
        match (self.active, self.payout_executed) {
            (true, _) => PolicyStatus::Active,
            (false, true) => PolicyStatus::PaidOut,
            (false, false) => PolicyStatus::Cancelled,
        }
    }

    /// Whether `height` lies in `[start_height, end_height]`
    pub fn covers(&self, height: Height) -> bool {
        (self.start_height..=self.end_height).contains(&height)
    }

    /// Eligible for automatic evaluation at `height`
    pub fn is_live_at(&self, height: Height) -> bool {
        self.active && !self.payout_executed && self.covers(height)
    }

    /// Fail unless the policy can still move into a terminal state
    ///
    /// Paid-out policies report `AlreadyPaid` ahead of `NotActive`.
    pub fn ensure_open(&self) -> std::result::Result<(), StateConflictError> {
        if self.payout_executed {
            return Err(StateConflictError::AlreadyPaid(self.id));
        }
        if !self.active {
            return Err(StateConflictError::NotActive(self.id));
        }
        Ok(())
    }
}

/// Terms requested by a prospective holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRequest {
    pub region: String,
    pub crop_type: String,
    pub coverage_amount: Amount,
    pub premium: Amount,
    /// Length of the coverage window in heights
    pub duration: u64,
    pub thresholds: Thresholds,
    pub oracle: Identity,
}

/// Request fields after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub region: Region,
    pub crop_type: CropType,
    pub coverage_amount: Amount,
    pub premium: Amount,
    pub duration: u64,
    pub thresholds: Thresholds,
    pub oracle: Identity,
}

impl CoverageRequest {
    /// Shape and range checks, in order; the oracle approval check is left to the caller
    pub fn validate(&self) -> std::result::Result<ValidatedRequest, ValidationError> {
        let region = Region::new(self.region.as_str())?;
        let crop_type = CropType::new(self.crop_type.as_str())?;

        if self.coverage_amount == 0 {
            return Err(ValidationError::InvalidCoverageAmount);
        }
        if self.premium == 0 {
            return Err(ValidationError::InvalidPremium);
        }
        if self.duration < MIN_COVERAGE_DURATION {
            return Err(ValidationError::DurationTooShort {
                duration: self.duration,
                minimum: MIN_COVERAGE_DURATION,
            });
        }

        let Thresholds {
            drought,
            excess_rain,
            frost,
        } = self.thresholds;
        if drought <= 0 {
            return Err(ValidationError::InvalidDroughtThreshold(drought));
        }
        if excess_rain <= drought {
            return Err(ValidationError::InvalidExcessRainThreshold {
                drought,
                excess_rain,
            });
        }
        if frost >= FROST_THRESHOLD_CEILING {
            return Err(ValidationError::InvalidFrostThreshold {
                frost,
                ceiling: FROST_THRESHOLD_CEILING,
            });
        }

        Ok(ValidatedRequest {
            region,
            crop_type,
            coverage_amount: self.coverage_amount,
            premium: self.premium,
            duration: self.duration,
            thresholds: self.thresholds,
            oracle: self.oracle.clone(),
        })
    }
}

/// Policies by id, with a region index for trigger scans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyStore {
    policies: BTreeMap<PolicyId, Policy>,
    by_region: HashMap<Region, BTreeSet<PolicyId>>,
    next_id: PolicyId,
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self {
            policies: BTreeMap::new(),
            by_region: HashMap::new(),
            next_id: FIRST_POLICY_ID,
        }
    }
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the next id; ids are never handed out twice
    pub fn allocate_id(&mut self) -> PolicyId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Id the next allocation will return
    pub fn peek_next_id(&self) -> PolicyId {
        self.next_id
    }

    /// Build an active policy from validated terms
    pub fn build(
        id: PolicyId,
        holder: Identity,
        request: ValidatedRequest,
        height: Height,
    ) -> std::result::Result<Policy, ValidationError> {
        let end_height = height
            .checked_add(request.duration)
            .ok_or(ValidationError::Overflow("end_height"))?;

        Ok(Policy {
            id,
            holder,
            region: request.region,
            crop_type: request.crop_type,
            coverage_amount: request.coverage_amount,
            premium: request.premium,
            start_height: height,
            end_height,
            active: true,
            payout_executed: false,
            oracle: request.oracle,
            thresholds: request.thresholds,
        })
    }

    pub fn insert(&mut self, policy: Policy) {
        self.by_region
            .entry(policy.region.clone())
            .or_default()
            .insert(policy.id);
        self.policies.insert(policy.id, policy);
    }

    pub fn get(&self, id: PolicyId) -> Option<&Policy> {
        self.policies.get(&id)
    }

    pub fn require(&self, id: PolicyId) -> Result<&Policy> {
        self.policies
            .get(&id)
            .ok_or_else(|| NotFoundError::Policy(id).into())
    }

    /// Move an open policy into the paid-out state
    pub fn mark_paid(&mut self, id: PolicyId) -> Result<&Policy> {
        self.terminate(id, true)
    }

    /// Move an open policy into the cancelled state
    pub fn mark_cancelled(&mut self, id: PolicyId) -> Result<&Policy> {
        self.terminate(id, false)
    }

    fn terminate(&mut self, id: PolicyId, paid: bool) -> Result<&Policy> {
        let policy = self
            .policies
            .get_mut(&id)
            .ok_or(NotFoundError::Policy(id))?;
        policy.ensure_open()?;
        policy.active = false;
        policy.payout_executed = paid;
        Ok(&*policy)
    }

    /// Ids of every policy in `region`, ascending
    pub fn in_region(&self, region: &Region) -> impl Iterator<Item = PolicyId> + '_ {
        self.by_region
            .get(region)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.values()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
