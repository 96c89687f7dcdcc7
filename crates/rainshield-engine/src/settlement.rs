//! Multi-transfer settlement with compensating rollback
//!
//! An operation may need several value movements (escrow, then fee). Each
//! completed transfer is recorded; if a later one fails, the recorded
//! transfers are reversed newest first so no partial movement survives.

use tracing::{error, warn};

use rainshield_common::{Amount, Identity, TransferError};

use crate::host::HostLedger;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Leg {
    amount: Amount,
    from: Identity,
    to: Identity,
}

/// Transfers applied on behalf of one engine operation
pub struct Settlement<'a, L: HostLedger> {
    ledger: &'a mut L,
    completed: Vec<Leg>,
}

impl<'a, L: HostLedger> Settlement<'a, L> {
    pub fn new(ledger: &'a mut L) -> Self {
        Self {
            ledger,
            completed: Vec::new(),
        }
    }

    /// Apply one transfer; zero amounts are skipped
    ///
    /// On failure every earlier transfer of this settlement is reversed
    /// before the error is returned.
    pub fn transfer(
        &mut self,
        amount: Amount,
        from: &Identity,
        to: &Identity,
    ) -> Result<(), TransferError> {
        if amount == 0 {
            return Ok(());
        }

        match self.ledger.transfer(amount, from, to) {
            Ok(()) => {
                self.completed.push(Leg {
                    amount,
                    from: from.clone(),
                    to: to.clone(),
                });
                Ok(())
            }
            Err(err) => {
                warn!(%amount, %from, %to, error = %err, "transfer rejected, unwinding settlement");
                self.unwind();
                Err(err)
            }
        }
    }

    /// Number of transfers applied and not yet unwound
    pub fn applied(&self) -> usize {
        self.completed.len()
    }

    /// Reverse every applied transfer, newest first
    pub fn unwind(&mut self) {
        while let Some(leg) = self.completed.pop() {
            if let Err(err) = self.ledger.transfer(leg.amount, &leg.to, &leg.from) {
                // The host guaranteed the forward leg; a failed reversal is a host fault.
                error!(
                    amount = leg.amount,
                    from = %leg.to,
                    to = %leg.from,
                    error = %err,
                    "compensating transfer failed"
                );
            }
        }
    }

    /// Keep every applied transfer
    pub fn commit(mut self) {
        self.completed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{InMemoryLedger, MockHostLedger};
    use mockall::predicate::*;
    use mockall::Sequence;

    #[test]
    fn test_failure_unwinds_previous_legs() {
        let holder = Identity::from("holder");
        let treasury = Identity::from("treasury");
        let fees = Identity::from("fees");
        let mut ledger = InMemoryLedger::new(1, holder.clone());
        ledger.fund(&holder, 1_000);
        ledger.fail_transfer_after(2);

        {
            let mut settlement = Settlement::new(&mut ledger);
            settlement.transfer(500, &holder, &treasury).unwrap();
            let result = settlement.transfer(10, &treasury, &fees);
            assert!(result.is_err());
            assert_eq!(settlement.applied(), 0);
        }

        assert_eq!(ledger.balance_of(&holder), 1_000);
        assert_eq!(ledger.balance_of(&treasury), 0);
        assert_eq!(ledger.balance_of(&fees), 0);
    }

    #[test]
    fn test_zero_amount_skipped() {
        let mut mock = MockHostLedger::new();
        mock.expect_transfer().never();

        let mut settlement = Settlement::new(&mut mock);
        settlement
            .transfer(0, &Identity::from("a"), &Identity::from("b"))
            .unwrap();
        settlement.commit();
    }

    #[test]
    fn test_reversal_order() {
        let a = Identity::from("a");
        let b = Identity::from("b");
        let c = Identity::from("c");
        let mut mock = MockHostLedger::new();
        let mut seq = Sequence::new();

        mock.expect_transfer()
            .with(eq(5), eq(a.clone()), eq(b.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        mock.expect_transfer()
            .with(eq(3), eq(b.clone()), eq(c.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        mock.expect_transfer()
            .with(eq(1), eq(c.clone()), eq(a.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(TransferError::Rejected("closed".into())));
        // reversals, newest first
        mock.expect_transfer()
            .with(eq(3), eq(c.clone()), eq(b.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        mock.expect_transfer()
            .with(eq(5), eq(b.clone()), eq(a.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let mut settlement = Settlement::new(&mut mock);
        settlement.transfer(5, &a, &b).unwrap();
        settlement.transfer(3, &b, &c).unwrap();
        assert!(settlement.transfer(1, &c, &a).is_err());
    }
}
