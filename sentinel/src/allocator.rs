//! Capital allocation planning
//!
//! Computes a target weight vector over the vault's active pools that
//! starves unsafe adapters and caps concentration risk. The planner
//! only proposes weights; vault state is mutated elsewhere.

use std::collections::HashMap;

use ethers::types::{Address, U256};
use tracing::{debug, warn};

use vigil_chainio::{PoolAllocation, ThreatLevel};

use crate::config::ShieldConfig;
use crate::types::{AdapterRiskInfo, AllocationResult};

/// 10_000 basis points = 100%
pub const BASIS_POINTS: u32 = 10_000;

/// Cap on the APY contribution to desirability, to keep yield-chasing
/// from overriding the risk-based ordering
const MAX_APY_BONUS: f64 = 20.0;

/// Compute target allocations from current pools and risk context.
///
/// Output weights sum to exactly 10_000 bps whenever at least one
/// active pool has nonzero desirability (and the configured cap makes
/// that reachable), and to all-zero when every active pool is excluded.
pub fn plan(
    pools: &[PoolAllocation],
    risk_info: &[AdapterRiskInfo],
    config: &ShieldConfig,
) -> Vec<AllocationResult> {
    let active: Vec<&PoolAllocation> = pools.iter().filter(|p| p.is_active).collect();
    if active.is_empty() {
        return Vec::new();
    }

    let risk_by_address: HashMap<Address, &AdapterRiskInfo> =
        risk_info.iter().map(|r| (r.address, r)).collect();

    // Desirability per pool; WARNING/CRITICAL is a hard exclusion
    let desirability: Vec<f64> = active
        .iter()
        .map(|pool| match risk_by_address.get(&pool.adapter) {
            Some(risk) if risk.threat_level >= ThreatLevel::Warning => 0.0,
            Some(risk) => {
                let inverse_risk = f64::max(1.0, 100.0 - f64::from(risk.risk_score));
                let apy_points =
                    risk.apy_bps.min(U256::from(u64::MAX)).as_u64() as f64 / 100.0;
                inverse_risk + apy_points.min(MAX_APY_BONUS)
            }
            // No risk record this cycle: treated as unscored, not unsafe
            None => 100.0,
        })
        .collect();

    let total: f64 = desirability.iter().sum();
    if total == 0.0 {
        // Every active pool excluded; starve them all rather than divide
        // by zero
        return active
            .iter()
            .map(|pool| AllocationResult {
                adapter: pool.adapter,
                new_weight_bps: 0,
            })
            .collect();
    }

    // Normalize into basis points, nearest-integer rounding
    let mut weights: Vec<u32> = desirability
        .iter()
        .map(|d| ((d / total) * f64::from(BASIS_POINTS)).round() as u32)
        .collect();

    apply_cap(&mut weights, config.max_single_allocation_bps);
    settle_rounding(&mut weights, config.max_single_allocation_bps);

    debug!(pools = active.len(), ?weights, "allocation plan computed");

    active
        .iter()
        .zip(weights)
        .map(|(pool, new_weight_bps)| AllocationResult {
            adapter: pool.adapter,
            new_weight_bps,
        })
        .collect()
}

/// Clip weights above the cap and redistribute the excess evenly across
/// pools still below it. Bounded by the pool count: each pass either
/// shrinks the uncapped set or clears the excess.
fn apply_cap(weights: &mut [u32], cap: u32) {
    for _ in 0..weights.len() {
        let mut excess = 0u32;
        let mut below_cap = 0u32;

        for weight in weights.iter_mut() {
            if *weight > cap {
                excess += *weight - cap;
                *weight = cap;
            } else if *weight > 0 && *weight < cap {
                below_cap += 1;
            }
        }

        if excess == 0 || below_cap == 0 {
            break;
        }

        let per_pool = excess / below_cap;
        if per_pool == 0 {
            // Remainder smaller than the eligible pool count; the
            // rounding settlement absorbs it
            break;
        }
        for weight in weights.iter_mut() {
            if *weight > 0 && *weight < cap {
                *weight += per_pool;
            }
        }
    }
}

/// Correct residual rounding error so totals hit exactly 10_000,
/// without breaching the cap or reviving an excluded pool. The largest
/// pool absorbs the slack, spilling to the next-largest when the cap
/// binds.
fn settle_rounding(weights: &mut [u32], cap: u32) {
    let total: i64 = weights.iter().map(|w| i64::from(*w)).sum();
    if total == 0 || total == i64::from(BASIS_POINTS) {
        return;
    }

    let mut diff = i64::from(BASIS_POINTS) - total;

    // Deterministic order: weight descending, then index
    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| weights[b].cmp(&weights[a]).then(a.cmp(&b)));

    for idx in order {
        if diff == 0 {
            break;
        }
        if weights[idx] == 0 {
            continue;
        }
        if diff > 0 {
            let headroom = i64::from(cap - weights[idx]);
            let take = diff.min(headroom);
            weights[idx] += take as u32;
            diff -= take;
        } else {
            let take = (-diff).min(i64::from(weights[idx]));
            weights[idx] -= take as u32;
            diff += take;
        }
    }

    if diff > 0 {
        // cap * pools < 10_000: the cap is a hard risk limit and wins
        warn!(
            shortfall_bps = diff,
            cap, "allocation cap prevents weights from reaching 10000 bps"
        );
    }
}

/// Decide whether the planned weights differ enough from the current
/// ones to justify an on-chain rebalance.
///
/// Pools absent from the planned set are skipped — "no opinion", not a
/// zero-weight difference — so a pool whose risk info could not be
/// fetched this cycle never triggers a spurious rebalance.
pub fn should_rebalance(
    current_pools: &[PoolAllocation],
    planned: &[AllocationResult],
    threshold_bps: u32,
) -> bool {
    for pool in current_pools {
        let Some(entry) = planned.iter().find(|r| r.adapter == pool.adapter) else {
            continue;
        };

        let delta =
            (i64::from(pool.target_weight_bps) - i64::from(entry.new_weight_bps)).abs();
        if delta >= i64::from(threshold_bps) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shield_config(cap: u32) -> ShieldConfig {
        ShieldConfig {
            warning_withdraw_bps: 3_000,
            safe_haven_adapter: "SafeHaven".to_string(),
            max_single_allocation_bps: cap,
            rebalance_threshold_bps: 500,
        }
    }

    fn pool(byte: u8, weight: u32, active: bool) -> PoolAllocation {
        PoolAllocation {
            adapter: Address::repeat_byte(byte),
            tier: 0,
            target_weight_bps: weight,
            current_amount: U256::from(1_000_000u64),
            is_active: active,
        }
    }

    fn risk(byte: u8, score: u8, apy_bps: u64) -> AdapterRiskInfo {
        AdapterRiskInfo {
            address: Address::repeat_byte(byte),
            risk_score: score,
            threat_level: ThreatLevel::from_score(score),
            apy_bps: U256::from(apy_bps),
        }
    }

    #[test]
    fn empty_input_is_a_noop() {
        assert!(plan(&[], &[], &shield_config(5_000)).is_empty());
    }

    #[test]
    fn inactive_pools_are_ignored() {
        let pools = vec![pool(1, 5_000, true), pool(2, 5_000, false)];
        let risks = vec![risk(1, 10, 500), risk(2, 10, 500)];
        let result = plan(&pools, &risks, &shield_config(10_000));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].new_weight_bps, 10_000);
    }

    #[test]
    fn weights_sum_to_exactly_10000() {
        let pools = vec![pool(1, 0, true), pool(2, 0, true), pool(3, 0, true)];
        let risks = vec![risk(1, 10, 500), risk(2, 25, 300), risk(3, 40, 900)];
        let result = plan(&pools, &risks, &shield_config(5_000));

        let total: u32 = result.iter().map(|r| r.new_weight_bps).sum();
        assert_eq!(total, BASIS_POINTS);
    }

    #[test]
    fn warning_and_critical_pools_get_zero_regardless_of_apy() {
        let pools = vec![
            pool(1, 2_500, true),
            pool(2, 2_500, true),
            pool(3, 2_500, true),
            pool(4, 2_500, true),
        ];
        let risks = vec![
            risk(1, 10, 500),
            risk(2, 20, 400),
            risk(3, 60, 99_999), // WARNING with absurd APY
            risk(4, 90, 99_999), // CRITICAL with absurd APY
        ];
        let config = shield_config(6_000);
        let result = plan(&pools, &risks, &config);

        let by_addr = |b: u8| {
            result
                .iter()
                .find(|r| r.adapter == Address::repeat_byte(b))
                .unwrap()
                .new_weight_bps
        };

        assert_eq!(by_addr(3), 0);
        assert_eq!(by_addr(4), 0);
        assert_eq!(by_addr(1) + by_addr(2), BASIS_POINTS);
        assert!(by_addr(1) <= 6_000);
        assert!(by_addr(2) <= 6_000);
    }

    #[test]
    fn all_excluded_returns_all_zero() {
        let pools = vec![pool(1, 5_000, true), pool(2, 5_000, true)];
        let risks = vec![risk(1, 80, 500), risk(2, 95, 500)];
        let result = plan(&pools, &risks, &shield_config(5_000));

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|r| r.new_weight_bps == 0));
    }

    #[test]
    fn cap_is_enforced_after_redistribution() {
        // One pool vastly more desirable than the rest
        let pools = vec![pool(1, 0, true), pool(2, 0, true), pool(3, 0, true)];
        let risks = vec![risk(1, 1, 2_000), risk(2, 95, 0), risk(3, 40, 100)];
        let config = shield_config(4_000);
        let result = plan(&pools, &risks, &config);

        for r in &result {
            assert!(
                r.new_weight_bps <= config.max_single_allocation_bps,
                "weight {} breaches cap",
                r.new_weight_bps
            );
        }
    }

    #[test]
    fn missing_risk_record_is_unscored_not_excluded() {
        let pools = vec![pool(1, 5_000, true), pool(2, 5_000, true)];
        let risks = vec![risk(1, 10, 500)]; // pool 2 has no record
        let result = plan(&pools, &risks, &shield_config(6_000));

        let total: u32 = result.iter().map(|r| r.new_weight_bps).sum();
        assert_eq!(total, BASIS_POINTS);
        assert!(result.iter().all(|r| r.new_weight_bps > 0));
    }

    #[test]
    fn should_rebalance_respects_threshold() {
        let pools = vec![pool(1, 5_000, true), pool(2, 5_000, true)];

        let close = vec![
            AllocationResult {
                adapter: Address::repeat_byte(1),
                new_weight_bps: 5_200,
            },
            AllocationResult {
                adapter: Address::repeat_byte(2),
                new_weight_bps: 4_800,
            },
        ];
        assert!(!should_rebalance(&pools, &close, 500));

        let diverged = vec![
            AllocationResult {
                adapter: Address::repeat_byte(1),
                new_weight_bps: 5_500,
            },
            AllocationResult {
                adapter: Address::repeat_byte(2),
                new_weight_bps: 4_500,
            },
        ];
        assert!(should_rebalance(&pools, &diverged, 500));
    }

    #[test]
    fn pools_missing_from_plan_are_skipped() {
        let pools = vec![pool(1, 9_000, true), pool(2, 1_000, true)];
        // Pool 1 absent from the plan: its huge implicit delta must not
        // trigger
        let planned = vec![AllocationResult {
            adapter: Address::repeat_byte(2),
            new_weight_bps: 1_100,
        }];
        assert!(!should_rebalance(&pools, &planned, 500));
    }
}
