//! Property tests over random operation sequences
//!
//! Whatever mix of calls succeeds or fails, pool accounting must keep
//! matching the host balances and no terminal policy may come back.

use std::collections::HashMap;

use proptest::prelude::*;

use rainshield_engine::{
    CoverageRequest, EngineConfig, HostLedger, Identity, InMemoryLedger, InsuranceEngine, PolicyStatus,
    Thresholds,
};

const FARMER: &str = "farmer";
const STATION: &str = "station";
const UNDERWRITER: &str = "underwriter";
const REGIONS: [&str; 2] = ["rift", "coast"];
const CROPS: [&str; 2] = ["maize", "sorghum"];

#[derive(Debug, Clone)]
enum Op {
    Create {
        region: usize,
        crop: usize,
        coverage: u64,
        premium: u64,
    },
    Cancel(usize),
    Evaluate(usize),
    Submit {
        region: usize,
        rainfall: i64,
        temperature: i64,
    },
    Contribute {
        crop: usize,
        amount: u64,
    },
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..2usize, 0..2usize, 1..20_000u64, 1..5_000u64).prop_map(
            |(region, crop, coverage, premium)| Op::Create {
                region,
                crop,
                coverage,
                premium,
            }
        ),
        (0..16usize).prop_map(Op::Cancel),
        (0..16usize).prop_map(Op::Evaluate),
        (0..2usize, 0..700i64, -20..40i64).prop_map(|(region, rainfall, temperature)| {
            Op::Submit {
                region,
                rainfall,
                temperature,
            }
        }),
        (0..2usize, 1..30_000u64).prop_map(|(crop, amount)| Op::Contribute { crop, amount }),
        (1..400u64).prop_map(Op::Advance),
    ]
}

fn engine() -> InsuranceEngine<InMemoryLedger> {
    let mut ledger = InMemoryLedger::new(1, Identity::from(STATION));
    ledger.fund(&Identity::from(FARMER), 10_000_000);
    ledger.fund(&Identity::from(UNDERWRITER), 10_000_000);
    let mut engine = InsuranceEngine::new(EngineConfig::default(), ledger).unwrap();
    engine.register_oracle("Station").unwrap();
    engine
}

fn apply(engine: &mut InsuranceEngine<InMemoryLedger>, issued: &mut Vec<u64>, op: &Op) {
    let caller = match op {
        Op::Submit { .. } => STATION,
        Op::Contribute { .. } => UNDERWRITER,
        _ => FARMER,
    };
    engine.ledger_mut().set_caller(Identity::from(caller));

    // individual operations may fail; only the resulting state is checked
    match *op {
        Op::Create {
            region,
            crop,
            coverage,
            premium,
        } => {
            let request = CoverageRequest {
                region: REGIONS[region].to_string(),
                crop_type: CROPS[crop].to_string(),
                coverage_amount: coverage,
                premium,
                duration: 1_000,
                thresholds: Thresholds {
                    drought: 100,
                    excess_rain: 500,
                    frost: -5,
                },
                oracle: Identity::from(STATION),
            };
            if let Ok(id) = engine.create_policy(request) {
                issued.push(id);
            }
        }
        Op::Cancel(idx) => {
            if let Some(&id) = issued.get(idx) {
                let _ = engine.cancel_policy(id);
            }
        }
        Op::Evaluate(idx) => {
            if let Some(&id) = issued.get(idx) {
                let _ = engine.evaluate_policy(id);
            }
        }
        Op::Submit {
            region,
            rainfall,
            temperature,
        } => {
            let _ = engine.submit_observation(REGIONS[region], rainfall, temperature, 50);
        }
        Op::Contribute { crop, amount } => {
            let _ = engine.contribute_capital(CROPS[crop], amount);
        }
        Op::Advance(delta) => {
            let next = engine.ledger().current_height() + delta;
            engine.ledger_mut().advance_to(next);
        }
    }
}

proptest! {
    #[test]
    fn prop_accounting_holds(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut engine = engine();
        let mut issued = Vec::new();
        let mut counters: HashMap<String, (u64, u64, u64, u64)> = HashMap::new();
        let mut terminal: HashMap<u64, PolicyStatus> = HashMap::new();

        for op in &ops {
            apply(&mut engine, &mut issued, op);

            prop_assert!(engine.check_invariants().is_empty());
            let treasury = engine.ledger().balance_of(&engine.config().treasury) as u128;
            prop_assert_eq!(treasury, engine.total_reserves());

            for crop in CROPS {
                if let Some(pool) = engine.get_pool(crop) {
                    let now = (
                        pool.premiums_collected,
                        pool.capital_contributed,
                        pool.payouts_made,
                        pool.refunds_paid,
                    );
                    let before = counters.insert(crop.to_string(), now).unwrap_or((0, 0, 0, 0));
                    prop_assert!(now.0 >= before.0 && now.1 >= before.1);
                    prop_assert!(now.2 >= before.2 && now.3 >= before.3);
                }
            }

            for &id in &issued {
                let policy = engine.get_policy(id).unwrap();
                prop_assert!(!(policy.payout_executed && policy.active));
                match terminal.get(&id).copied() {
                    Some(status) => prop_assert_eq!(policy.status(), status),
                    None if policy.status() != PolicyStatus::Active => {
                        terminal.insert(id, policy.status());
                    }
                    None => {}
                }
            }
        }
    }

    #[test]
    fn prop_fee_split_is_exact(premium in 1..u64::MAX / 2, fee_rate_bps in 0..=10_000u64) {
        let config = EngineConfig { fee_rate_bps, ..EngineConfig::default() };
        let mut ledger = InMemoryLedger::new(1, Identity::from(STATION));
        ledger.fund(&Identity::from(FARMER), premium);
        let mut engine = InsuranceEngine::new(config, ledger).unwrap();
        engine.register_oracle("Station").unwrap();
        engine.ledger_mut().set_caller(Identity::from(FARMER));

        engine.create_policy(CoverageRequest {
            region: "rift".to_string(),
            crop_type: "maize".to_string(),
            coverage_amount: 1,
            premium,
            duration: 1_000,
            thresholds: Thresholds { drought: 1, excess_rain: 2, frost: -30 },
            oracle: Identity::from(STATION),
        }).unwrap();

        let fee = engine.ledger().balance_of(&engine.config().fee_recipient);
        let pool = engine.get_pool("maize").unwrap();
        prop_assert_eq!(fee + pool.premiums_collected, premium);
        prop_assert_eq!(pool.balance, pool.premiums_collected);
    }
}
