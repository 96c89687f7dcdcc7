//! Approval policies gating oracle registration

use std::collections::HashSet;

use rainshield_common::Identity;

/// Decides whether an identity may register itself as an oracle
///
/// Swapping the policy changes the trust model without touching trigger
/// evaluation or pool accounting.
pub trait ApprovalPolicy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether `applicant` may hold an active registration
    fn may_register(&self, applicant: &Identity) -> bool;

    /// Admit `identity` to future registration; open policies ignore this
    fn grant(&mut self, _identity: &Identity) {}

    /// Withdraw a previous grant; returns whether anything changed
    fn withdraw(&mut self, _identity: &Identity) -> bool {
        false
    }
}

/// Any identity may register itself
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfRegistration;

impl ApprovalPolicy for SelfRegistration {
    fn name(&self) -> &'static str {
        "self-registration"
    }

    fn may_register(&self, _applicant: &Identity) -> bool {
        true
    }
}

/// Only pre-approved identities may register
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    allowed: HashSet<Identity>,
}

impl Allowlist {
    pub fn new(allowed: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl ApprovalPolicy for Allowlist {
    fn name(&self) -> &'static str {
        "allowlist"
    }

    fn may_register(&self, applicant: &Identity) -> bool {
        self.allowed.contains(applicant)
    }

    fn grant(&mut self, identity: &Identity) {
        self.allowed.insert(identity.clone());
    }

    fn withdraw(&mut self, identity: &Identity) -> bool {
        self.allowed.remove(identity)
    }
}
