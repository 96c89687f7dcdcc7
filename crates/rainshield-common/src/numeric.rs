//! Basis-point arithmetic
//!
//! All ratios are expressed in basis points of [`BPS_DENOMINATOR`]. Products
//! are widened to `u128` so `amount * bps` cannot overflow, and every division
//! truncates toward zero.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::{Amount, Height};

/// 100% in basis points
pub const BPS_DENOMINATOR: u64 = 10_000;

/// A premium divided between the protocol and the risk pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    /// Forwarded to the fee recipient
    pub protocol_fee: Amount,
    /// Credited to the crop's risk pool
    pub fund_contribution: Amount,
}

impl FeeSplit {
    /// Sum of both parts, always equal to the premium that was split
    #[inline]
    pub fn total(&self) -> Amount {
        self.protocol_fee + self.fund_contribution
    }
}

/// `amount * bps / 10000`, with `bps` capped at 100%
pub fn apply_bps(amount: Amount, bps: u64) -> Amount {
    let bps = bps.min(BPS_DENOMINATOR);
    // bps <= 10000 keeps the quotient <= amount
    ((amount as u128 * bps as u128) / BPS_DENOMINATOR as u128) as Amount
}

/// Split a premium into protocol fee and fund contribution
pub fn split_premium(premium: Amount, fee_rate_bps: u64) -> Result<FeeSplit, ValidationError> {
    if fee_rate_bps > BPS_DENOMINATOR {
        return Err(ValidationError::InvalidFeeRate(fee_rate_bps));
    }

    let protocol_fee = apply_bps(premium, fee_rate_bps);
    Ok(FeeSplit {
        protocol_fee,
        fund_contribution: premium - protocol_fee,
    })
}

/// Share of the coverage window still ahead of `height`, in basis points
///
/// `remaining` is clamped to `[0, period]`: cancelling at or after the end of
/// the window yields 0, and a height before the start yields the full 10000.
pub fn refund_ratio_bps(start_height: Height, end_height: Height, height: Height) -> u64 {
    let period = end_height.saturating_sub(start_height);
    if period == 0 {
        return 0;
    }

    let elapsed = height.saturating_sub(start_height);
    let remaining = period.saturating_sub(elapsed);
    ((remaining as u128 * BPS_DENOMINATOR as u128) / period as u128) as u64
}

/// Pro-rata refund of `premium` for a cancellation at `height`
pub fn refund_amount(
    premium: Amount,
    start_height: Height,
    end_height: Height,
    height: Height,
) -> Amount {
    apply_bps(premium, refund_ratio_bps(start_height, end_height, height))
}

/// Strict margin check: a difference equal to the tolerance is rejected
#[inline]
pub fn within_tolerance(difference: u64, tolerance: u64) -> bool {
    difference < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_truncates_fee() {
        let split = split_premium(999, 250).unwrap();
        // 999 * 250 / 10000 = 24.975
        assert_eq!(split.protocol_fee, 24);
        assert_eq!(split.fund_contribution, 975);
    }

    #[test]
    fn test_split_rejects_fee_above_100_percent() {
        assert_eq!(
            split_premium(100, 10_001),
            Err(ValidationError::InvalidFeeRate(10_001))
        );
        let full = split_premium(100, BPS_DENOMINATOR).unwrap();
        assert_eq!(full.protocol_fee, 100);
        assert_eq!(full.fund_contribution, 0);
    }

    #[test]
    fn test_refund_ratio_endpoints() {
        assert_eq!(refund_ratio_bps(100, 1100, 100), BPS_DENOMINATOR);
        assert_eq!(refund_ratio_bps(100, 1100, 600), 5_000);
        assert_eq!(refund_ratio_bps(100, 1100, 1100), 0);
    }

    #[test]
    fn test_refund_after_expiry_is_zero() {
        assert_eq!(refund_ratio_bps(100, 1100, 5_000), 0);
        assert_eq!(refund_amount(1_000, 100, 1100, 5_000), 0);
    }

    #[test]
    fn test_refund_amount_truncates() {
        // 3 remaining of 1000 -> 30 bps -> 777 * 30 / 10000 = 2.331
        assert_eq!(refund_amount(777, 0, 1000, 997), 2);
    }

    #[test]
    fn test_tolerance_boundary() {
        assert!(within_tolerance(4, 5));
        assert!(!within_tolerance(5, 5));
        assert!(within_tolerance(0, 2));
    }

    proptest! {
        #[test]
        fn fee_split_conserves_premium(premium in 1u64..=u64::MAX, bps in 0u64..=BPS_DENOMINATOR) {
            let split = split_premium(premium, bps).unwrap();
            prop_assert_eq!(split.total(), premium);
            prop_assert!(split.protocol_fee <= premium);
        }

        #[test]
        fn refund_never_exceeds_premium(
            premium in 1u64..1_000_000_000,
            start in 0u64..1_000_000,
            duration in 1000u64..100_000,
            offset in 0u64..200_000,
        ) {
            let end = start + duration;
            let refund = refund_amount(premium, start, end, start + offset);
            prop_assert!(refund <= premium);
            if offset >= duration {
                prop_assert_eq!(refund, 0);
            }
        }
    }
}
