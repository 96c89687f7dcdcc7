//! Risk pool accounting
//!
//! One reserve per crop type. `balance` is the spendable reserve and never
//! goes negative: every debit is checked against it first. Cumulative
//! counters only grow.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use rainshield_common::{
    Amount, CropType, NotFoundError, Result, StateConflictError, DEFAULT_RESERVE_TARGET_BPS,
};

/// Reserve backing every policy written for one crop type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskPool {
    pub crop_type: CropType,
    /// Cumulative fund contributions from premiums
    pub premiums_collected: Amount,
    /// Cumulative underwriter capital
    pub capital_contributed: Amount,
    /// Cumulative payouts to holders
    pub payouts_made: Amount,
    /// Cumulative cancellation refunds
    pub refunds_paid: Amount,
    pub active_policies: u64,
    /// Informational reserve target in basis points
    pub reserve_target_bps: u64,
    /// Current spendable reserve
    pub balance: Amount,
}

impl RiskPool {
    pub fn new(crop_type: CropType) -> Self {
        Self {
            crop_type,
            premiums_collected: 0,
            capital_contributed: 0,
            payouts_made: 0,
            refunds_paid: 0,
            active_policies: 0,
            reserve_target_bps: DEFAULT_RESERVE_TARGET_BPS,
            balance: 0,
        }
    }

    /// Fail unless `amount` can be drawn from the reserve
    pub fn ensure_reserve(&self, amount: Amount) -> Result<()> {
        if self.balance < amount {
            return Err(StateConflictError::InsufficientReserve {
                crop_type: self.crop_type.to_string(),
                required: amount,
                available: self.balance,
            }
            .into());
        }
        Ok(())
    }

    /// Balance implied by the cumulative counters
    pub fn expected_balance(&self) -> Option<Amount> {
        self.premiums_collected
            .checked_add(self.capital_contributed)?
            .checked_sub(self.payouts_made)?
            .checked_sub(self.refunds_paid)
    }

    fn credit_premium(&mut self, amount: Amount) {
        self.premiums_collected = self.premiums_collected.saturating_add(amount);
        self.balance = self.balance.saturating_add(amount);
        self.active_policies += 1;
    }

    fn add_capital(&mut self, amount: Amount) {
        self.capital_contributed = self.capital_contributed.saturating_add(amount);
        self.balance = self.balance.saturating_add(amount);
    }

    fn debit_payout(&mut self, amount: Amount) -> Result<()> {
        self.ensure_reserve(amount)?;
        self.payouts_made = self.payouts_made.saturating_add(amount);
        self.balance -= amount;
        self.active_policies = self.active_policies.saturating_sub(1);
        Ok(())
    }

    fn debit_refund(&mut self, amount: Amount) -> Result<()> {
        self.ensure_reserve(amount)?;
        self.refunds_paid = self.refunds_paid.saturating_add(amount);
        self.balance -= amount;
        self.active_policies = self.active_policies.saturating_sub(1);
        Ok(())
    }
}

/// All pools, keyed by crop type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskPoolBook {
    pools: HashMap<CropType, RiskPool>,
}

impl RiskPoolBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a premium's fund contribution, creating the pool if absent
    pub fn credit_premium(&mut self, crop_type: &CropType, amount: Amount) {
        self.entry(crop_type).credit_premium(amount);
    }

    /// Credit underwriter capital, creating the pool if absent
    pub fn add_capital(&mut self, crop_type: &CropType, amount: Amount) {
        self.entry(crop_type).add_capital(amount);
    }

    /// Pay out `amount`; fails without mutation if the reserve is short
    pub fn debit_payout(&mut self, crop_type: &CropType, amount: Amount) -> Result<()> {
        self.get_mut(crop_type)?.debit_payout(amount)
    }

    /// Refund `amount`; does not count toward `payouts_made`
    pub fn debit_refund(&mut self, crop_type: &CropType, amount: Amount) -> Result<()> {
        self.get_mut(crop_type)?.debit_refund(amount)
    }

    /// Fail unless the pool exists and holds at least `amount`
    pub fn ensure_reserve(&self, crop_type: &CropType, amount: Amount) -> Result<()> {
        self.pools
            .get(crop_type)
            .ok_or_else(|| NotFoundError::Pool(crop_type.to_string()))?
            .ensure_reserve(amount)
    }

    pub fn get(&self, crop_type: &CropType) -> Option<&RiskPool> {
        self.pools.get(crop_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RiskPool> {
        self.pools.values()
    }

    /// Sum of every pool's balance
    pub fn total_balance(&self) -> u128 {
        self.pools.values().map(|p| p.balance as u128).sum()
    }

    fn entry(&mut self, crop_type: &CropType) -> &mut RiskPool {
        self.pools
            .entry(crop_type.clone())
            .or_insert_with(|| RiskPool::new(crop_type.clone()))
    }

    fn get_mut(&mut self, crop_type: &CropType) -> Result<&mut RiskPool> {
        self.pools
            .get_mut(crop_type)
            .ok_or_else(|| NotFoundError::Pool(crop_type.to_string()).into())
    }
}
