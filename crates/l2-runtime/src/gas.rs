//! Gas excess tracking
//!
//! The excess grows by the gas each block uses and shrinks by the gas issued
//! for the time elapsed since the parent, never dropping below the configured
//! floor.

use l1_integration::BaseFeeConfig;

/// Gas issued for `elapsed` seconds, capped per block
pub fn gas_issuance(config: &BaseFeeConfig, elapsed: u64) -> u64 {
    elapsed
        .saturating_mul(u64::from(config.gas_issuance_per_second))
        .min(u64::from(config.max_gas_issuance_per_block))
}

/// Excess after a parent block that used `parent_gas_used`
pub fn next_gas_excess(
    config: &BaseFeeConfig,
    prev_excess: u64,
    parent_gas_used: u32,
    elapsed: u64,
) -> u64 {
    prev_excess
        .saturating_add(u64::from(parent_gas_used))
        .saturating_sub(gas_issuance(config, elapsed))
        .max(config.min_gas_excess)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> BaseFeeConfig {
        BaseFeeConfig {
            adjustment_quotient: 8,
            sharing_pctg: 75,
            gas_issuance_per_second: 1_000,
            min_gas_excess: 10_000,
            max_gas_issuance_per_block: 5_000,
        }
    }

    #[test]
    fn test_issuance_capped_per_block() {
        assert_eq!(gas_issuance(&config(), 0), 0);
        assert_eq!(gas_issuance(&config(), 3), 3_000);
        assert_eq!(gas_issuance(&config(), 60), 5_000);
        assert_eq!(gas_issuance(&config(), u64::MAX), 5_000);
    }

    #[test]
    fn test_excess_accumulates_and_drains() {
        let c = config();
        assert_eq!(next_gas_excess(&c, 20_000, 4_000, 2), 22_000);
        assert_eq!(next_gas_excess(&c, 20_000, 0, 100), 15_000);
        assert_eq!(next_gas_excess(&c, 11_000, 0, 100), 10_000);
    }

    proptest! {
        #[test]
        fn prop_excess_never_below_floor(prev: u64, used: u32, elapsed: u64) {
            let c = config();
            prop_assert!(next_gas_excess(&c, prev, used, elapsed) >= c.min_gas_excess);
        }
    }
}
