//! # Integration Tests
//!
//! End-to-end tests across crates:
//! - contract snapshot checks
//! - config file -> ConfigLoader -> PriorityDispatcher -> LimitedChannel<LogHandler>

#[cfg(test)]
mod contract_tests {
    use contracts::{DispatcherConfig, SendResult, SendStatus};

    #[test]
    fn test_config_defaults() {
        let config = DispatcherConfig::with_types("d", [("a", 1)]);
        assert_eq!(config.polling_interval_ms, 300);
        assert_eq!(config.shutdown_timeout_ms, 60_000);
    }

    #[test]
    fn test_send_status_names() {
        assert_eq!(SendResult::<()>::NotSentShuttingDown.status(), SendStatus::NotSentShuttingDown);
        assert_eq!(SendStatus::NotSentShuttingDown.to_string(), "not_sent_shutting_down");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::time::Duration;

    use config_loader::ConfigLoader;
    use contracts::{DispatcherConfig, ExpirationDate, SendResult, SendStatus};
    use dispatcher::{
        Completion, DeliveryReceipt, DispatcherError, DispatcherState, DispatcherWaker,
        LimitedChannel, LogHandler, PriorityDispatcher,
    };

    type Dispatcher = PriorityDispatcher<LimitedChannel<LogHandler<String>>>;

    const CONFIG: &str = r#"
name = "e2e"
polling_interval_ms = 20
shutdown_timeout_ms = 2000

[registered_types]
high = 3
low = 1
"#;

    fn load_config() -> DispatcherConfig {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        ConfigLoader::load_from_path(file.path()).unwrap()
    }

    fn start(config: &DispatcherConfig, max_in_flight: usize, latency: Duration) -> Dispatcher {
        let waker = DispatcherWaker::new();
        let handler = LogHandler::new("e2e-channel").with_latency(latency);
        let channel = LimitedChannel::new(handler, max_in_flight).with_waker(waker.clone());
        PriorityDispatcher::spawn_with_waker(config, channel, waker).unwrap()
    }

    fn submit(dispatcher: &Dispatcher, message_type: &str, i: usize) -> Completion<DeliveryReceipt> {
        dispatcher
            .submit(
                format!("{message_type}-{i}"),
                message_type,
                ExpirationDate::expires_in_ms(10_000),
            )
            .unwrap()
    }

    /// Cold start with one slot: weights 3:1 decide the delivery order
    #[tokio::test]
    async fn test_e2e_weighted_order() {
        let config = load_config();
        let dispatcher = start(&config, 1, Duration::ZERO);

        let mut pending = Vec::new();
        for i in 0..4 {
            pending.push(("low", submit(&dispatcher, "low", i)));
        }
        for i in 0..4 {
            pending.push(("high", submit(&dispatcher, "high", i)));
        }

        let mut delivered = Vec::new();
        for (message_type, completion) in pending {
            let result = tokio::time::timeout(Duration::from_secs(2), completion)
                .await
                .expect("completion timed out")
                .unwrap();
            let receipt = result.into_sent().expect("message was not sent");
            delivered.push((receipt.sequence, message_type));
        }
        delivered.sort();

        let order: Vec<_> = delivered.into_iter().map(|(_, t)| t).collect();
        assert_eq!(
            order,
            vec!["high", "high", "high", "low", "high", "low", "low", "low"]
        );
        assert_eq!(dispatcher.channel().handler().delivered(), 8);

        dispatcher.close_and_wait().await;
        assert!(dispatcher.is_terminated());
    }

    /// Drain delivers everything buffered, then refuses new messages
    #[tokio::test]
    async fn test_e2e_drain() {
        let config = load_config();
        let dispatcher = start(&config, 2, Duration::from_millis(5));

        let completions: Vec<_> = (0..6).map(|i| submit(&dispatcher, "high", i)).collect();
        dispatcher.request_drain();
        assert_eq!(dispatcher.state(), DispatcherState::Draining);

        let late = submit(&dispatcher, "low", 0).await.unwrap();
        assert_eq!(late.status(), SendStatus::NotSentShuttingDown);

        for completion in completions {
            assert!(completion.await.unwrap().is_sent());
        }

        dispatcher.close_and_wait().await;
        assert_eq!(dispatcher.pending_count(), 0);
        assert_eq!(dispatcher.metrics().snapshot().sent, 6);
    }

    /// Forced shutdown abandons whatever is still buffered
    #[tokio::test]
    async fn test_e2e_force_shutdown() {
        let config = load_config();
        let dispatcher = start(&config, 1, Duration::from_millis(50));

        let completions: Vec<_> = (0..5).map(|i| submit(&dispatcher, "low", i)).collect();
        dispatcher.request_force_shutdown();

        for completion in completions {
            let result = tokio::time::timeout(Duration::from_secs(1), completion)
                .await
                .expect("abandoned message was not resolved")
                .unwrap();
            assert_eq!(result, SendResult::NotSentShuttingDown);
        }

        dispatcher.close_and_wait().await;
        let snapshot = dispatcher.metrics().snapshot();
        assert_eq!(snapshot.force_completed, 5);
        assert_eq!(snapshot.sent, 0);
        assert_eq!(dispatcher.channel().handler().delivered(), 0);
    }

    /// Messages already past their deadline resolve as not sent
    #[tokio::test]
    async fn test_e2e_expired_messages() {
        let config = load_config();
        let dispatcher = start(&config, 1, Duration::ZERO);

        let expired = dispatcher
            .submit("stale".to_string(), "high", ExpirationDate::expires_in_ms(-1))
            .unwrap();
        let fresh = submit(&dispatcher, "low", 0);

        assert_eq!(expired.await.unwrap(), SendResult::NotSent);
        assert!(fresh.await.unwrap().is_sent());

        dispatcher.close_and_wait().await;
        assert_eq!(dispatcher.metrics().snapshot().expired, 1);
    }

    #[tokio::test]
    async fn test_e2e_unregistered_type_rejected() {
        let config = load_config();
        let dispatcher = start(&config, 1, Duration::ZERO);

        let err = dispatcher
            .submit("x".to_string(), "medium", ExpirationDate::expires_in_ms(1_000))
            .err()
            .unwrap();
        assert!(matches!(err, DispatcherError::UnregisteredType { .. }));

        dispatcher.close_and_wait().await;
    }
}
