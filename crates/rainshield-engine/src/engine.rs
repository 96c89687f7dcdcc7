//! Insurance engine - the public contract surface
//!
//! Every operation reads the caller and height from the host ledger, runs all
//! checks, performs value transfers through a [`Settlement`], and only then
//! commits store mutations and journals the event. A failed transfer unwinds
//! earlier transfers and leaves every store untouched.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use rainshield_common::numeric::{refund_amount, split_premium};
use rainshield_common::{
    Amount, AuthorizationError, CropType, Height, Identity, NotFoundError, OracleName, PolicyId,
    RainshieldError, Region, Result, StateConflictError, ValidationError,
};

use crate::climate::{ClimateLedger, Observation, ObservationRef, Reading};
use crate::config::EngineConfig;
use crate::host::HostLedger;
use crate::journal::{EngineEvent, Journal};
use crate::oracle::{ApprovalPolicy, OracleRegistration, OracleRegistry, SelfRegistration};
use crate::policy::{CoverageRequest, Policy, PolicyStore};
use crate::pool::{RiskPool, RiskPoolBook};
use crate::settlement::Settlement;
use crate::trigger::{self, TriggerCause};

/// Engine behind a mutex, for hosts that call from several threads
pub type SharedEngine<L> = Arc<Mutex<InsuranceEngine<L>>>;

/// A payout that was settled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub policy_id: PolicyId,
    pub holder: Identity,
    pub amount: Amount,
    pub cause: TriggerCause,
}

/// A triggered policy whose payout could not be settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredPayout {
    pub policy_id: PolicyId,
    pub cause: TriggerCause,
    pub error: RainshieldError,
}

/// Outcome of an observation submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub observation: ObservationRef,
    /// Policies paid out by this submission
    pub payouts: Vec<Payout>,
    /// Policies that fired but stayed active because settlement failed
    pub deferred: Vec<DeferredPayout>,
}

/// Serializable copy of the four keyed stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub oracles: OracleRegistry,
    pub climate: ClimateLedger,
    pub pools: RiskPoolBook,
    pub policies: PolicyStore,
}

impl EngineSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Accounting inconsistency found by [`InsuranceEngine::check_invariants`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvariantViolation {
    /// Balance differs from the cumulative counters
    BalanceMismatch {
        crop_type: CropType,
        expected: Option<Amount>,
        balance: Amount,
    },
    /// Pool's active count differs from the policy store
    ActiveCountMismatch {
        crop_type: CropType,
        recorded: u64,
        actual: u64,
    },
}

/// Parametric insurance engine
pub struct InsuranceEngine<L: HostLedger> {
    config: EngineConfig,
    ledger: L,
    approval: Box<dyn ApprovalPolicy>,
    oracles: OracleRegistry,
    climate: ClimateLedger,
    pools: RiskPoolBook,
    policies: PolicyStore,
    journal: Journal,
}

impl<L: HostLedger> InsuranceEngine<L> {
    /// Create an engine where oracles register themselves
    pub fn new(config: EngineConfig, ledger: L) -> Result<Self> {
        Self::with_approval(config, ledger, Box::new(SelfRegistration))
    }

    /// Create an engine gated by a custom approval policy
    pub fn with_approval(
        config: EngineConfig,
        ledger: L,
        approval: Box<dyn ApprovalPolicy>,
    ) -> Result<Self> {
        Self::from_snapshot(
            config,
            ledger,
            approval,
            EngineSnapshot {
                oracles: OracleRegistry::new(),
                climate: ClimateLedger::new(),
                pools: RiskPoolBook::new(),
                policies: PolicyStore::new(),
            },
        )
    }

    /// Resume from previously persisted stores
    pub fn from_snapshot(
        config: EngineConfig,
        ledger: L,
        approval: Box<dyn ApprovalPolicy>,
        snapshot: EngineSnapshot,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            fee_rate_bps = config.fee_rate_bps,
            approval = approval.name(),
            policies = snapshot.policies.len(),
            "insurance engine initialized"
        );

        Ok(Self {
            config,
            ledger,
            approval,
            oracles: snapshot.oracles,
            climate: snapshot.climate,
            pools: snapshot.pools,
            policies: snapshot.policies,
            journal: Journal::new(),
        })
    }

    /// Wrap the engine for shared use
    pub fn into_shared(self) -> SharedEngine<L> {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    // ============ ORACLES ============

    /// Register the caller as an oracle
    #[instrument(skip(self))]
    pub fn register_oracle(&mut self, name: &str) -> Result<OracleRegistration> {
        let caller = self.ledger.caller_identity();
        let height = self.ledger.current_height();
        let name = OracleName::new(name)?;

        if !self.approval.may_register(&caller) {
            warn!(oracle = %caller, approval = self.approval.name(), "oracle registration denied");
            return Err(AuthorizationError::RegistrationDenied(caller.to_string()).into());
        }

        let registration = match self.oracles.register(caller.clone(), name, height) {
            Ok(registration) => registration,
            Err(err) => {
                warn!(oracle = %caller, "registration by revoked oracle refused");
                return Err(err.into());
            }
        };
        info!(oracle = %caller, name = %registration.name, "oracle registered");
        self.journal.record(
            height,
            EngineEvent::OracleRegistered {
                oracle: caller,
                name: registration.name.to_string(),
            },
        );
        Ok(registration)
    }

    /// Deactivate an oracle and bar it from re-registering; admin only
    ///
    /// The identity is also withdrawn from the approval policy.
    #[instrument(skip(self))]
    pub fn revoke_oracle(&mut self, oracle: &Identity) -> Result<()> {
        let height = self.ledger.current_height();
        self.require_admin()?;

        self.oracles.revoke(oracle)?;
        self.approval.withdraw(oracle);
        info!(oracle = %oracle, "oracle revoked");
        self.journal.record(
            height,
            EngineEvent::OracleRevoked {
                oracle: oracle.clone(),
            },
        );
        Ok(())
    }

    /// Lift a revocation, reactivating the registration; admin only
    #[instrument(skip(self))]
    pub fn reinstate_oracle(&mut self, oracle: &Identity) -> Result<OracleRegistration> {
        let height = self.ledger.current_height();
        self.require_admin()?;

        let registration = self.oracles.reinstate(oracle)?.clone();
        self.approval.grant(oracle);
        info!(oracle = %oracle, "oracle reinstated");
        self.journal.record(
            height,
            EngineEvent::OracleReinstated {
                oracle: oracle.clone(),
            },
        );
        Ok(registration)
    }

    /// Admit an applicant to the approval policy; admin only
    #[instrument(skip(self))]
    pub fn grant_registration(&mut self, applicant: &Identity) -> Result<()> {
        let height = self.ledger.current_height();
        self.require_admin()?;

        self.approval.grant(applicant);
        info!(applicant = %applicant, approval = self.approval.name(), "registration granted");
        self.journal.record(
            height,
            EngineEvent::RegistrationGranted {
                applicant: applicant.clone(),
            },
        );
        Ok(())
    }

    fn require_admin(&self) -> Result<()> {
        let caller = self.ledger.caller_identity();
        if self.config.admin.as_ref() != Some(&caller) {
            warn!(caller = %caller, "governance call by non-admin");
            return Err(AuthorizationError::NotAdmin(caller.to_string()).into());
        }
        Ok(())
    }

    pub fn is_oracle_approved(&self, identity: &Identity) -> bool {
        self.oracles.is_approved(identity)
    }

    // ============ POLICIES ============

    /// Issue a policy to the caller, escrowing the premium
    ///
    /// The policy id is consumed before any transfer, so a creation rolled
    /// back by a transfer failure leaves a gap in the id sequence.
    #[instrument(skip(self))]
    pub fn create_policy(&mut self, request: CoverageRequest) -> Result<PolicyId> {
        let holder = self.ledger.caller_identity();
        let height = self.ledger.current_height();

        let terms = request.validate()?;
        if !self.oracles.is_approved(&terms.oracle) {
            warn!(oracle = %terms.oracle, "policy linked to unapproved oracle");
            return Err(AuthorizationError::OracleNotApproved(terms.oracle.to_string()).into());
        }
        let split = split_premium(terms.premium, self.config.fee_rate_bps)?;
        let policy = PolicyStore::build(self.policies.peek_next_id(), holder.clone(), terms, height)?;
        let policy_id = self.policies.allocate_id();

        let mut settlement = Settlement::new(&mut self.ledger);
        let transferred = settlement
            .transfer(policy.premium, &holder, &self.config.treasury)
            .and_then(|()| {
                settlement.transfer(
                    split.protocol_fee,
                    &self.config.treasury,
                    &self.config.fee_recipient,
                )
            });
        if let Err(err) = transferred {
            warn!(policy_id, error = %err, "premium settlement failed, policy not issued");
            return Err(err.into());
        }
        settlement.commit();

        self.pools
            .credit_premium(&policy.crop_type, split.fund_contribution);
        info!(
            policy_id,
            holder = %holder,
            region = %policy.region,
            crop_type = %policy.crop_type,
            coverage = policy.coverage_amount,
            premium = policy.premium,
            protocol_fee = split.protocol_fee,
            "policy created"
        );
        self.journal.record(
            height,
            EngineEvent::PolicyCreated {
                policy_id,
                holder,
                region: policy.region.clone(),
                crop_type: policy.crop_type.clone(),
                coverage_amount: policy.coverage_amount,
                protocol_fee: split.protocol_fee,
                fund_contribution: split.fund_contribution,
            },
        );
        self.policies.insert(policy);
        Ok(policy_id)
    }

    /// Cancel the caller's policy with a pro-rata premium refund
    #[instrument(skip(self))]
    pub fn cancel_policy(&mut self, policy_id: PolicyId) -> Result<Amount> {
        let caller = self.ledger.caller_identity();
        let height = self.ledger.current_height();

        let policy = self.policies.require(policy_id)?;
        if policy.holder != caller {
            warn!(policy_id, caller = %caller, "cancellation by non-holder");
            return Err(AuthorizationError::NotPolicyHolder {
                policy_id,
                caller: caller.to_string(),
            }
            .into());
        }
        policy.ensure_open()?;

        let refund = refund_amount(policy.premium, policy.start_height, policy.end_height, height);
        let crop_type = policy.crop_type.clone();
        let holder = policy.holder.clone();
        self.pools.ensure_reserve(&crop_type, refund)?;

        let mut settlement = Settlement::new(&mut self.ledger);
        settlement.transfer(refund, &self.config.treasury, &holder)?;
        settlement.commit();

        self.policies.mark_cancelled(policy_id)?;
        self.pools.debit_refund(&crop_type, refund)?;
        info!(policy_id, refund, "policy cancelled");
        self.journal.record(
            height,
            EngineEvent::PolicyCancelled {
                policy_id,
                holder,
                refund,
            },
        );
        Ok(refund)
    }

    /// Evaluate a policy against the observation at the current height
    ///
    /// Callable by the holder or the policy's oracle while it is approved.
    /// Only heights inside the coverage window are evaluated. Returns whether
    /// the trigger fired; a fired trigger is paid out before returning.
    #[instrument(skip(self))]
    pub fn evaluate_policy(&mut self, policy_id: PolicyId) -> Result<bool> {
        let caller = self.ledger.caller_identity();
        let height = self.ledger.current_height();

        let policy = self.policies.require(policy_id)?;
        if policy.holder != caller && policy.oracle != caller {
            warn!(policy_id, caller = %caller, "evaluation by unrelated caller");
            return Err(AuthorizationError::NotHolderOrOracle {
                policy_id,
                caller: caller.to_string(),
            }
            .into());
        }
        if policy.holder != caller && !self.oracles.is_approved(&caller) {
            warn!(policy_id, oracle = %caller, "evaluation by unapproved oracle");
            return Err(AuthorizationError::OracleNotApproved(caller.to_string()).into());
        }
        policy.ensure_open()?;
        if !policy.covers(height) {
            debug!(
                policy_id,
                height,
                end_height = policy.end_height,
                "evaluation outside coverage"
            );
            return Err(StateConflictError::OutsideCoverageWindow { policy_id, height }.into());
        }

        let observation = self.climate.latest(&policy.region, height).ok_or_else(|| {
            NotFoundError::NoWeatherData {
                region: policy.region.to_string(),
                height,
            }
        })?;

        let fired = trigger::evaluate(&policy.thresholds, observation);
        match fired {
            Some(cause) => {
                self.execute_payout(policy_id, cause, height)?;
                Ok(true)
            }
            None => {
                debug!(policy_id, height, "trigger not met");
                Ok(false)
            }
        }
    }

    /// Settle a triggered policy: transfer coverage, then mark paid and debit the pool
    fn execute_payout(
        &mut self,
        policy_id: PolicyId,
        cause: TriggerCause,
        height: Height,
    ) -> Result<Payout> {
        let policy = self.policies.require(policy_id)?;
        policy.ensure_open()?;
        let holder = policy.holder.clone();
        let amount = policy.coverage_amount;
        let crop_type = policy.crop_type.clone();

        if let Err(err) = self.pools.ensure_reserve(&crop_type, amount) {
            warn!(policy_id, crop_type = %crop_type, error = %err, "payout blocked by reserve");
            return Err(err);
        }

        let mut settlement = Settlement::new(&mut self.ledger);
        settlement.transfer(amount, &self.config.treasury, &holder)?;
        settlement.commit();

        self.policies.mark_paid(policy_id)?;
        self.pools.debit_payout(&crop_type, amount)?;
        info!(policy_id, holder = %holder, amount, %cause, "payout executed");
        self.journal.record(
            height,
            EngineEvent::PayoutExecuted {
                policy_id,
                holder: holder.clone(),
                amount,
                cause,
            },
        );

        Ok(Payout {
            policy_id,
            holder,
            amount,
            cause,
        })
    }

    pub fn get_policy(&self, policy_id: PolicyId) -> Option<&Policy> {
        self.policies.get(policy_id)
    }

    /// Every policy written for `region`, terminal ones included
    pub fn policies_in_region(&self, region: &str) -> Vec<&Policy> {
        let Ok(region) = Region::new(region) else {
            return Vec::new();
        };
        self.policies
            .in_region(&region)
            .filter_map(|id| self.policies.get(id))
            .collect()
    }

    // ============ OBSERVATIONS ============

    /// Record an observation at the current height and run the region's triggers
    #[instrument(skip(self))]
    pub fn submit_observation(
        &mut self,
        region: &str,
        rainfall: i64,
        temperature: i64,
        humidity: u64,
    ) -> Result<SubmissionReceipt> {
        let submitter = self.ledger.caller_identity();
        let height = self.ledger.current_height();

        if !self.oracles.is_approved(&submitter) {
            warn!(submitter = %submitter, "observation from unapproved oracle");
            return Err(AuthorizationError::OracleNotApproved(submitter.to_string()).into());
        }
        let region = Region::new(region)?;

        let reading = Reading {
            rainfall,
            temperature,
            humidity,
        };
        let observation = match self
            .climate
            .submit(region.clone(), height, reading, submitter.clone())
        {
            Ok(observation) => observation,
            Err(err) => {
                warn!(region = %region, height, "overwrite of verified observation refused");
                return Err(err);
            }
        };
        debug!(region = %region, height, digest = %observation.digest, "observation stored");
        self.journal.record(
            height,
            EngineEvent::ObservationSubmitted {
                region: region.clone(),
                submitter,
                digest: observation.digest.clone(),
            },
        );

        let (payouts, deferred) = self.run_triggers(&region, height);
        Ok(SubmissionReceipt {
            observation,
            payouts,
            deferred,
        })
    }

    /// Evaluate every live policy in `region` against the observation at `height`
    ///
    /// Each payout settles on its own; one failing does not stop the scan.
    fn run_triggers(
        &mut self,
        region: &Region,
        height: Height,
    ) -> (Vec<Payout>, Vec<DeferredPayout>) {
        let mut payouts = Vec::new();
        let mut deferred = Vec::new();

        let Some(observation) = self.climate.latest(region, height).cloned() else {
            return (payouts, deferred);
        };

        for policy_id in trigger::candidates(&self.policies, region, height) {
            let Some(cause) = self
                .policies
                .get(policy_id)
                .and_then(|p| trigger::evaluate(&p.thresholds, &observation))
            else {
                continue;
            };

            match self.execute_payout(policy_id, cause, height) {
                Ok(payout) => payouts.push(payout),
                Err(error) => {
                    warn!(policy_id, %cause, error = %error, "triggered payout deferred");
                    deferred.push(DeferredPayout {
                        policy_id,
                        cause,
                        error,
                    });
                }
            }
        }

        debug!(
            region = %region,
            height,
            paid = payouts.len(),
            deferred = deferred.len(),
            "trigger scan complete"
        );
        (payouts, deferred)
    }

    /// Attest an existing observation with independently observed readings
    #[instrument(skip(self))]
    pub fn verify_observation(
        &mut self,
        region: &str,
        height: Height,
        rainfall: i64,
        temperature: i64,
        humidity: u64,
    ) -> Result<ObservationRef> {
        let verifier = self.ledger.caller_identity();
        let current = self.ledger.current_height();

        if !self.oracles.is_approved(&verifier) {
            warn!(verifier = %verifier, "verification from unapproved oracle");
            return Err(AuthorizationError::OracleNotApproved(verifier.to_string()).into());
        }
        let region = Region::new(region)?;

        let reading = Reading {
            rainfall,
            temperature,
            humidity,
        };
        let verified =
            self.climate
                .verify(&region, height, &reading, &verifier, &self.config.tolerance)?;
        info!(region = %region, height, verifier = %verifier, "observation verified");
        self.journal.record(
            current,
            EngineEvent::ObservationVerified {
                region,
                observed_at: height,
                verifier,
            },
        );
        Ok(verified)
    }

    /// Observation stored at exactly `(region, height)`
    pub fn get_observation(&self, region: &str, height: Height) -> Option<&Observation> {
        let region = Region::new(region).ok()?;
        self.climate.latest(&region, height)
    }

    /// Most recent observation at or before `height`
    pub fn most_recent_observation(&self, region: &str, height: Height) -> Option<&Observation> {
        let region = Region::new(region).ok()?;
        self.climate.most_recent(&region, height)
    }

    // ============ POOLS ============

    /// Add underwriting capital from the caller to a crop's pool
    #[instrument(skip(self))]
    pub fn contribute_capital(&mut self, crop_type: &str, amount: Amount) -> Result<&RiskPool> {
        let contributor = self.ledger.caller_identity();
        let height = self.ledger.current_height();
        let crop_type = CropType::new(crop_type)?;
        if amount == 0 {
            return Err(ValidationError::InvalidAmount.into());
        }

        let mut settlement = Settlement::new(&mut self.ledger);
        settlement.transfer(amount, &contributor, &self.config.treasury)?;
        settlement.commit();

        self.pools.add_capital(&crop_type, amount);
        info!(crop_type = %crop_type, contributor = %contributor, amount, "capital contributed");
        self.journal.record(
            height,
            EngineEvent::CapitalContributed {
                crop_type: crop_type.clone(),
                contributor,
                amount,
            },
        );

        self.pools
            .get(&crop_type)
            .ok_or_else(|| RainshieldError::Internal(format!("pool {crop_type} vanished")))
    }

    pub fn get_pool(&self, crop_type: &str) -> Option<&RiskPool> {
        let crop_type = CropType::new(crop_type).ok()?;
        self.pools.get(&crop_type)
    }

    /// Sum of every pool's balance
    pub fn total_reserves(&self) -> u128 {
        self.pools.total_balance()
    }

    /// Cross-check pool counters against balances and the policy store
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        for pool in self.pools.iter() {
            let expected = pool.expected_balance();
            if expected != Some(pool.balance) {
                violations.push(InvariantViolation::BalanceMismatch {
                    crop_type: pool.crop_type.clone(),
                    expected,
                    balance: pool.balance,
                });
            }

            let actual = self
                .policies
                .iter()
                .filter(|p| p.active && p.crop_type == pool.crop_type)
                .count() as u64;
            if actual != pool.active_policies {
                violations.push(InvariantViolation::ActiveCountMismatch {
                    crop_type: pool.crop_type.clone(),
                    recorded: pool.active_policies,
                    actual,
                });
            }
        }

        violations
    }

    // ============ STATE ============

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            oracles: self.oracles.clone(),
            climate: self.climate.clone(),
            pools: self.pools.clone(),
            policies: self.policies.clone(),
        }
    }
}
