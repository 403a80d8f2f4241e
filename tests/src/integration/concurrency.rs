//! # Service Concurrency
//!
//! Queries run against committed state while transactions hold the write
//! lock, and never observe a half-applied transaction.

#[cfg(test)]
mod tests {
    use crate::fixtures::{engine, keeper, COUNTER_WASM};
    use qc_wasm::adapters::mock_engine::MockGasCosts;
    use qc_wasm::config::WasmConfig;
    use qc_wasm::domain::value_objects::Address;
    use qc_wasm::ports::inbound::WasmApi;
    use qc_wasm::service::{ServiceConfig, WasmService};
    use std::sync::Arc;

    fn service() -> Arc<WasmService> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        let keeper = keeper(engine(MockGasCosts::default()), WasmConfig::default());
        Arc::new(WasmService::new(keeper, ServiceConfig::default()))
    }

    async fn deploy_counter(service: &WasmService, sender: &Address) -> Address {
        let code_id = service
            .store_code(sender.clone(), COUNTER_WASM.to_vec(), None)
            .await
            .unwrap()
            .value
            .0;
        service
            .instantiate(sender.clone(), code_id, None, b"{}".to_vec(), "counter".into(), vec![])
            .await
            .unwrap()
            .value
            .0
    }

    fn count(raw: &[u8]) -> u64 {
        String::from_utf8_lossy(raw).parse().unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queries_race_with_transactions() {
        let service = service();
        let sender = Address::new(vec![3; 20]);
        let counter = deploy_counter(&service, &sender).await;

        let mut queries = Vec::new();
        for _ in 0..32 {
            let service = Arc::clone(&service);
            let counter = counter.clone();
            queries.push(tokio::spawn(async move {
                service.smart_query(counter, b"{}".to_vec()).await
            }));
        }

        let mut writes = Vec::new();
        for _ in 0..8 {
            let service = Arc::clone(&service);
            let counter = counter.clone();
            let sender = sender.clone();
            writes.push(tokio::spawn(async move {
                service.execute(sender, counter, b"{}".to_vec(), vec![]).await
            }));
        }

        for query in queries {
            let answer = query.await.unwrap().unwrap();
            assert!(count(&answer) <= 8);
        }
        for write in writes {
            write.await.unwrap().unwrap();
        }

        let last = service.smart_query(counter, b"{}".to_vec()).await.unwrap();
        assert_eq!(count(&last), 8);

        let stats = service.stats().await;
        assert_eq!(stats.successful_transactions, 10);
        assert_eq!(stats.failed_queries, 0);
        assert_eq!(stats.queries_served, 33);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_transactions_are_serialized() {
        let service = service();
        let sender = Address::new(vec![4; 20]);
        let counter = deploy_counter(&service, &sender).await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let service = Arc::clone(&service);
                let counter = counter.clone();
                let sender = sender.clone();
                tokio::spawn(async move { service.execute(sender, counter, Vec::new(), vec![]).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let raw = service
            .raw_query(counter, b"count".to_vec())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(count(&raw), 16);
        assert_eq!(service.block().await.tx_index, 18);
    }
}
