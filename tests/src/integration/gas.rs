//! # Gas Accounting
//!
//! Out-of-gas determinism across independent runs, and gas charged by
//! submessages with their own limit.

#[cfg(test)]
mod tests {
    use crate::fixtures::{execute_msg, reflect_msg, Harness, COUNTER_WASM, FLAKY_WASM, REFLECT_WASM};
    use qc_wasm::adapters::mock_engine::MockGasCosts;
    use qc_wasm::config::WasmConfig;
    use qc_wasm::domain::messages::SubMsg;
    use qc_wasm::errors::WasmError;

    fn metered() -> Harness {
        Harness::with(MockGasCosts::default(), WasmConfig::default())
    }

    /// Runs `command` on a fresh flaky contract and reports the error text
    /// and the gas consumed.
    fn run_out_of_gas(command: &[u8], gas_limit: u64) -> (String, u64) {
        let mut harness = metered();
        let flaky = harness.deploy(FLAKY_WASM, 0);
        harness.reset(gas_limit);
        let err = harness.execute(&flaky, command).unwrap_err();
        assert!(err.is_out_of_gas(), "unexpected error: {err}");
        (err.to_string(), harness.meter.consumed())
    }

    // =========================================================================
    // DETERMINISM
    // =========================================================================

    #[test]
    fn test_spinning_contract_stops_identically() {
        let first = run_out_of_gas(b"spin", 70_000);
        let second = run_out_of_gas(b"spin", 70_000);
        assert_eq!(first, second);
        assert!(first.1 >= 70_000);
    }

    #[test]
    fn test_burning_contract_stops_identically() {
        let first = run_out_of_gas(b"burn", 200_000);
        let second = run_out_of_gas(b"burn", 200_000);
        assert_eq!(first, second);
    }

    #[test]
    fn test_setup_cost_alone_can_exhaust_the_meter() {
        let mut harness = metered();
        let counter = harness.deploy(COUNTER_WASM, 0);
        harness.reset(1_000);
        let err = harness.execute(&counter, b"{}").unwrap_err();
        assert!(err.is_out_of_gas());
        assert_eq!(harness.raw(&counter, b"count"), Some(b"0".to_vec()));
    }

    // =========================================================================
    // SUBMESSAGE LIMITS
    // =========================================================================

    #[test]
    fn test_limited_submessage_charges_exactly_its_limit() {
        let limit = 150_000;
        let mut harness = metered();
        let reflect = harness.deploy(REFLECT_WASM, 0);
        let flaky = harness.deploy(FLAKY_WASM, 0);

        // the same call without the submessage, to isolate its cost
        harness.reset(10_000_000);
        harness.execute(&reflect, &reflect_msg(&[])).unwrap();
        let baseline = harness.meter.consumed();

        let msgs = [SubMsg::new(execute_msg(&flaky, b"burn")).with_gas_limit(limit)];
        harness.reset(10_000_000);
        let err = harness.execute(&reflect, &reflect_msg(&msgs)).unwrap_err();
        assert!(!err.is_out_of_gas());
        assert!(matches!(err.root(), WasmError::SubMsgGasLimit { limit: l } if *l == limit));
        assert_eq!(harness.meter.consumed(), baseline + limit);
    }

    #[test]
    fn test_limit_above_remaining_gas_is_ignored() {
        let mut harness = metered();
        let reflect = harness.deploy(REFLECT_WASM, 0);
        let flaky = harness.deploy(FLAKY_WASM, 0);

        let msgs = [SubMsg::new(execute_msg(&flaky, b"burn")).with_gas_limit(u64::MAX)];
        harness.reset(10_000_000);
        let err = harness.execute(&reflect, &reflect_msg(&msgs)).unwrap_err();
        assert!(err.is_out_of_gas());
    }
}
