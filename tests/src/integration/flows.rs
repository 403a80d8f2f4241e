//! # Contract Flows
//!
//! End-to-end behavior of the keeper: deposits, custom events, bank
//! submessages and replies, submessage isolation and reply gating.

#[cfg(test)]
mod tests {
    use crate::fixtures::{
        execute_msg, payout_event, reflect_msg, reply_key, Harness, PayoutMsg, DEPOSITOR_WASM,
        FLAKY_WASM, LAST_REPLY_KEY, REFLECT_WASM, TOUCHED_KEY,
    };
    use qc_wasm::domain::messages::{Reply, SubMsg, SubMsgResult};
    use qc_wasm::domain::value_objects::Address;
    use qc_wasm::errors::WasmError;

    fn stored_reply(harness: &mut Harness, contract: &Address, key: &[u8]) -> Option<Reply> {
        harness
            .raw(contract, key)
            .map(|raw| serde_json::from_slice(&raw).unwrap())
    }

    fn has_event_from(harness: &Harness, contract: &Address) -> bool {
        let addr = contract.to_string();
        harness
            .events
            .events()
            .iter()
            .any(|e| e.attribute("_contract_address") == Some(addr.as_str()))
    }

    // =========================================================================
    // END TO END
    // =========================================================================

    #[test]
    fn test_deposit_payout_and_reply() {
        let mut harness = Harness::new();
        let contract = harness.deploy(DEPOSITOR_WASM, 1000);
        assert_eq!(harness.balance(&contract), 1000);

        let recipient = Address::new(vec![0xBB; 20]);
        let msg = serde_json::to_vec(&PayoutMsg {
            recipient: recipient.to_string(),
            amount: 250,
        })
        .unwrap();

        harness.reset(10_000_000);
        harness.execute(&contract, &msg).unwrap();

        // the transfer landed
        assert_eq!(harness.balance(&recipient), 250);
        assert_eq!(harness.balance(&contract), 750);

        // the reply saw the transfer event and nothing else
        let reply = stored_reply(&mut harness, &contract, LAST_REPLY_KEY).unwrap();
        assert_eq!(reply.id, 1);
        let SubMsgResult::Ok(response) = &reply.result else {
            panic!("expected a successful submessage, got {:?}", reply.result);
        };
        assert_eq!(response.events.len(), 1);
        assert_eq!(response.events[0].ty, "transfer");

        // the custom event is prefixed and tagged with the contract
        let custom = harness
            .events
            .events()
            .iter()
            .find(|e| e.ty == "wasm-payout")
            .unwrap();
        assert_eq!(custom.attribute("hello"), Some("world!"));
        assert!(harness.events.events().iter().all(|e| e.ty != "message"));

        // every unit of gas is accounted for by the cost model
        let register = harness.keeper.gas_register();
        let expected = register.instantiate_cost(false, msg.len()).unwrap()
            + register.event_costs(&[], &[payout_event()]).unwrap()
            + register.reply_cost(true, &reply).unwrap();
        assert_eq!(harness.meter.consumed(), expected);
    }

    // =========================================================================
    // ISOLATION
    // =========================================================================

    #[test]
    fn test_failed_submessage_leaves_no_trace() {
        let mut harness = Harness::new();
        let reflect = harness.deploy(REFLECT_WASM, 0);
        let flaky = harness.deploy(FLAKY_WASM, 0);

        let msgs = [SubMsg::reply_on_error(execute_msg(&flaky, b"write_then_fail"), 7)];
        harness.reset(10_000_000);
        harness.execute(&reflect, &reflect_msg(&msgs)).unwrap();

        assert_eq!(harness.raw(&flaky, TOUCHED_KEY), None);
        assert!(!has_event_from(&harness, &flaky));

        let reply = stored_reply(&mut harness, &reflect, &reply_key(7)).unwrap();
        let SubMsgResult::Err(text) = reply.result else {
            panic!("expected an error reply");
        };
        // contracts only see the code, not the engine text
        assert!(!text.contains("flaky failure"));
    }

    #[test]
    fn test_successful_submessage_is_committed() {
        let mut harness = Harness::new();
        let reflect = harness.deploy(REFLECT_WASM, 0);
        let flaky = harness.deploy(FLAKY_WASM, 0);

        let msgs = [SubMsg::reply_on_success(execute_msg(&flaky, b"write"), 8)];
        harness.reset(10_000_000);
        let data = harness.execute(&reflect, &reflect_msg(&msgs)).unwrap();

        assert_eq!(harness.raw(&flaky, TOUCHED_KEY), Some(b"yes".to_vec()));
        assert!(has_event_from(&harness, &flaky));
        // data set by the reply wins
        assert_eq!(data.unwrap().as_slice(), reply_key(8).as_slice());
    }

    #[test]
    fn test_submessage_gas_limit_is_recoverable() {
        let mut harness = Harness::new();
        let reflect = harness.deploy(REFLECT_WASM, 0);
        let flaky = harness.deploy(FLAKY_WASM, 0);

        let limit = 100_000;
        let msgs = [SubMsg::reply_always(execute_msg(&flaky, b"burn"), 9).with_gas_limit(limit)];
        harness.reset(10_000_000);
        harness.execute(&reflect, &reflect_msg(&msgs)).unwrap();

        assert_eq!(harness.raw(&flaky, TOUCHED_KEY), None);
        let reply = stored_reply(&mut harness, &reflect, &reply_key(9)).unwrap();
        assert!(!reply.result.is_ok());
        assert!(harness.meter.consumed() >= limit);
    }

    #[test]
    fn test_out_of_gas_without_limit_aborts_the_call() {
        let mut harness = Harness::new();
        let reflect = harness.deploy(REFLECT_WASM, 0);
        let flaky = harness.deploy(FLAKY_WASM, 0);

        let msgs = [SubMsg::reply_always(execute_msg(&flaky, b"burn"), 10)];
        harness.reset(10_000_000);
        let err = harness.execute(&reflect, &reflect_msg(&msgs)).unwrap_err();
        assert!(err.is_out_of_gas());
    }

    // =========================================================================
    // REPLY GATING
    // =========================================================================

    #[test]
    fn test_reply_on_success_skips_failures() {
        let mut harness = Harness::new();
        let reflect = harness.deploy(REFLECT_WASM, 0);
        let flaky = harness.deploy(FLAKY_WASM, 0);

        // no reply for a failure means the failure belongs to the caller
        let msgs = [SubMsg::reply_on_success(execute_msg(&flaky, b"write_then_fail"), 1)];
        let err = harness.execute(&reflect, &reflect_msg(&msgs)).unwrap_err();
        assert!(matches!(err.root(), WasmError::ExecuteFailed(_)));
    }

    #[test]
    fn test_reply_on_error_skips_successes() {
        let mut harness = Harness::new();
        let reflect = harness.deploy(REFLECT_WASM, 0);
        let flaky = harness.deploy(FLAKY_WASM, 0);

        let msgs = [SubMsg::reply_on_error(execute_msg(&flaky, b"write"), 2)];
        let data = harness.execute(&reflect, &reflect_msg(&msgs)).unwrap();
        assert_eq!(data, None);
        assert_eq!(harness.raw(&reflect, &reply_key(2)), None);
        assert_eq!(harness.raw(&flaky, TOUCHED_KEY), Some(b"yes".to_vec()));
    }

    #[test]
    fn test_reply_never_propagates_failures() {
        let mut harness = Harness::new();
        let reflect = harness.deploy(REFLECT_WASM, 0);
        let flaky = harness.deploy(FLAKY_WASM, 0);

        let msgs = [SubMsg::new(execute_msg(&flaky, b"write_then_fail"))];
        assert!(harness.execute(&reflect, &reflect_msg(&msgs)).is_err());
    }

    #[test]
    fn test_reply_always_sees_both_outcomes() {
        let mut harness = Harness::new();
        let reflect = harness.deploy(REFLECT_WASM, 0);
        let flaky = harness.deploy(FLAKY_WASM, 0);

        let msgs = [
            SubMsg::reply_always(execute_msg(&flaky, b"write_then_fail"), 3),
            SubMsg::reply_always(execute_msg(&flaky, b"write"), 4),
        ];
        harness.execute(&reflect, &reflect_msg(&msgs)).unwrap();

        let failed = stored_reply(&mut harness, &reflect, &reply_key(3)).unwrap();
        let passed = stored_reply(&mut harness, &reflect, &reply_key(4)).unwrap();
        assert!(!failed.result.is_ok());
        assert!(passed.result.is_ok());
        assert_eq!(harness.raw(&flaky, TOUCHED_KEY), Some(b"yes".to_vec()));
    }
}
