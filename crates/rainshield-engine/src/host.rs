//! Host ledger seam
//!
//! The engine never moves value or reads the clock itself. It asks the host
//! ledger for the current height and the authenticated caller, and delegates
//! every value movement to [`HostLedger::transfer`].

use std::collections::HashMap;

use rainshield_common::{Amount, Height, Identity, TransferError};

/// Capabilities supplied by the host ledger
#[cfg_attr(test, mockall::automock)]
pub trait HostLedger {
    /// Monotonic logical clock
    fn current_height(&self) -> Height;

    /// Authenticated invoker of the current operation
    fn caller_identity(&self) -> Identity;

    /// Move `amount` from `from` to `to`
    ///
    /// Must be atomic: on error no value has moved.
    fn transfer(&mut self, amount: Amount, from: &Identity, to: &Identity)
        -> Result<(), TransferError>;
}

/// In-memory host ledger with balances and failure injection
///
/// Used by tests and by embedders that keep balances in process.
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    height: Height,
    caller: Identity,
    balances: HashMap<Identity, Amount>,
    transfers_seen: usize,
    fail_at: Option<usize>,
}

impl InMemoryLedger {
    /// Create a ledger at `height` with `caller` as the invoker
    pub fn new(height: Height, caller: Identity) -> Self {
        Self {
            height,
            caller,
            balances: HashMap::new(),
            transfers_seen: 0,
            fail_at: None,
        }
    }

    /// Credit `amount` to `account` out of thin air
    pub fn fund(&mut self, account: &Identity, amount: Amount) {
        *self.balances.entry(account.clone()).or_insert(0) += amount;
    }

    /// Current balance of `account`
    pub fn balance_of(&self, account: &Identity) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Switch the authenticated caller
    pub fn set_caller(&mut self, caller: Identity) {
        self.caller = caller;
    }

    /// Move the clock to `height`; heights never go backwards
    pub fn advance_to(&mut self, height: Height) {
        self.height = self.height.max(height);
    }

    /// Reject the `n`th transfer from now (1-based), then resume normally
    pub fn fail_transfer_after(&mut self, n: usize) {
        self.fail_at = Some(self.transfers_seen + n);
    }

    /// Number of transfer attempts observed so far
    pub fn transfers_seen(&self) -> usize {
        self.transfers_seen
    }
}

impl HostLedger for InMemoryLedger {
    fn current_height(&self) -> Height {
        self.height
    }

    fn caller_identity(&self) -> Identity {
        self.caller.clone()
    }

    fn transfer(
        &mut self,
        amount: Amount,
        from: &Identity,
        to: &Identity,
    ) -> Result<(), TransferError> {
        self.transfers_seen += 1;
        if self.fail_at == Some(self.transfers_seen) {
            self.fail_at = None;
            return Err(TransferError::Rejected(format!(
                "injected failure moving {amount} from {from} to {to}"
            )));
        }

        let available = self.balance_of(from);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                account: from.to_string(),
                required: amount,
                available,
            });
        }

        *self.balances.entry(from.clone()).or_insert(0) -= amount;
        *self.balances.entry(to.clone()).or_insert(0) += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_moves_balance() {
        let alice = Identity::from("alice");
        let bob = Identity::from("bob");
        let mut ledger = InMemoryLedger::new(1, alice.clone());
        ledger.fund(&alice, 100);

        ledger.transfer(40, &alice, &bob).unwrap();
        assert_eq!(ledger.balance_of(&alice), 60);
        assert_eq!(ledger.balance_of(&bob), 40);
    }

    #[test]
    fn test_insufficient_funds() {
        let alice = Identity::from("alice");
        let bob = Identity::from("bob");
        let mut ledger = InMemoryLedger::new(1, alice.clone());
        ledger.fund(&alice, 10);

        let result = ledger.transfer(11, &alice, &bob);
        assert!(matches!(result, Err(TransferError::InsufficientFunds { .. })));
        assert_eq!(ledger.balance_of(&alice), 10);
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let alice = Identity::from("alice");
        let bob = Identity::from("bob");
        let mut ledger = InMemoryLedger::new(1, alice.clone());
        ledger.fund(&alice, 100);
        ledger.fail_transfer_after(2);

        assert!(ledger.transfer(1, &alice, &bob).is_ok());
        assert!(matches!(
            ledger.transfer(1, &alice, &bob),
            Err(TransferError::Rejected(_))
        ));
        assert!(ledger.transfer(1, &alice, &bob).is_ok());
        assert_eq!(ledger.balance_of(&bob), 2);
    }

    #[test]
    fn test_height_is_monotonic() {
        let mut ledger = InMemoryLedger::new(50, Identity::from("x"));
        ledger.advance_to(40);
        assert_eq!(ledger.current_height(), 50);
        ledger.advance_to(60);
        assert_eq!(ledger.current_height(), 60);
    }
}
