//! Event journal
//!
//! Append-only record of every committed engine operation. Entries are only
//! written after an operation has fully succeeded, so a rolled-back operation
//! leaves no trace here.

use serde::{Deserialize, Serialize};

use rainshield_common::{Amount, CropType, Height, Identity, PolicyId, Region};

use crate::trigger::TriggerCause;

/// Committed state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    OracleRegistered {
        oracle: Identity,
        name: String,
    },
    OracleRevoked {
        oracle: Identity,
    },
    OracleReinstated {
        oracle: Identity,
    },
    RegistrationGranted {
        applicant: Identity,
    },
    PolicyCreated {
        policy_id: PolicyId,
        holder: Identity,
        region: Region,
        crop_type: CropType,
        coverage_amount: Amount,
        protocol_fee: Amount,
        fund_contribution: Amount,
    },
    CapitalContributed {
        crop_type: CropType,
        contributor: Identity,
        amount: Amount,
    },
    ObservationSubmitted {
        region: Region,
        submitter: Identity,
        digest: String,
    },
    ObservationVerified {
        region: Region,
        observed_at: Height,
        verifier: Identity,
    },
    PayoutExecuted {
        policy_id: PolicyId,
        holder: Identity,
        amount: Amount,
        cause: TriggerCause,
    },
    PolicyCancelled {
        policy_id: PolicyId,
        holder: Identity,
        refund: Amount,
    },
}

/// Journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique entry ID (UUIDv7, time ordered)
    pub entry_id: String,
    /// Wall-clock time of commit (Unix millis)
    pub recorded_at: i64,
    /// Host height the operation ran at
    pub height: Height,
    pub event: EngineEvent,
}

/// Append-only event log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, height: Height, event: EngineEvent) -> &JournalEntry {
        self.entries.push(JournalEntry {
            entry_id: uuid::Uuid::now_v7().to_string(),
            recorded_at: chrono::Utc::now().timestamp_millis(),
            height,
            event,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Entries concerning one policy
    pub fn for_policy(&self, policy_id: PolicyId) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter().filter(move |e| match &e.event {
            EngineEvent::PolicyCreated { policy_id: id, .. }
            | EngineEvent::PayoutExecuted { policy_id: id, .. }
            | EngineEvent::PolicyCancelled { policy_id: id, .. } => *id == policy_id,
            _ => false,
        })
    }

    /// Export as a JSON array
    pub fn to_json(&self) -> rainshield_common::Result<String> {
        Ok(serde_json::to_string(&self.entries)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
