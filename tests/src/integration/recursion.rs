//! # Query Recursion
//!
//! Contracts querying contracts: the stack stops at
//! `max_query_stack_size`, counting the top-level query as depth one.

#[cfg(test)]
mod tests {
    use crate::fixtures::{DepthQuery, Harness, RECURSER_WASM};
    use qc_wasm::adapters::mock_engine::MockGasCosts;
    use qc_wasm::config::WasmConfig;
    use qc_wasm::domain::value_objects::Address;
    use qc_wasm::errors::WasmResult;

    fn query_depth(harness: &mut Harness, contract: &Address, depth: u32) -> WasmResult<Vec<u8>> {
        let msg = serde_json::to_vec(&DepthQuery { depth }).unwrap();
        let keeper = std::sync::Arc::clone(&harness.keeper);
        keeper.query_smart(&mut harness.ctx(), contract, &msg)
    }

    #[test]
    fn test_recursion_up_to_the_limit_succeeds() {
        let mut harness = Harness::new();
        let contract = harness.deploy(RECURSER_WASM, 0);
        let max = harness.keeper.config().max_query_stack_size;

        harness.reset(50_000_000);
        let answer = query_depth(&mut harness, &contract, max - 1).unwrap();
        assert_eq!(answer, b"bottom");
    }

    #[test]
    fn test_recursion_past_the_limit_fails() {
        let mut harness = Harness::new();
        let contract = harness.deploy(RECURSER_WASM, 0);
        let max = harness.keeper.config().max_query_stack_size;

        harness.reset(50_000_000);
        assert!(query_depth(&mut harness, &contract, max).is_err());
    }

    #[test]
    fn test_configured_limit_is_honored() {
        let config = WasmConfig {
            max_query_stack_size: 3,
            ..WasmConfig::default()
        };
        let mut harness = Harness::with(MockGasCosts::free(), config);
        let contract = harness.deploy(RECURSER_WASM, 0);

        harness.reset(50_000_000);
        assert!(query_depth(&mut harness, &contract, 2).is_ok());

        harness.reset(50_000_000);
        assert!(query_depth(&mut harness, &contract, 3).is_err());
    }

    #[test]
    fn test_plain_query_has_no_recursion() {
        let mut harness = Harness::new();
        let contract = harness.deploy(RECURSER_WASM, 0);
        assert_eq!(query_depth(&mut harness, &contract, 0).unwrap(), b"bottom");
    }
}
