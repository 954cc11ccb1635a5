#[cfg(test)]
mod tests {
    use crate::config::{DependencyConfig, HealthConfig};
    use crate::error::AppError;
    use crate::health::{
        DependencyProbe, HealthAggregator, HealthReport, HealthStatus, ProbeContext, ProbeError,
        SelfProbe,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    /// Scripted dependency behaviours.
    enum FakeProbe {
        Healthy,
        Failing(&'static str),
        Delayed(Duration, Option<&'static str>),
        Blocked,
        Panicking,
    }

    #[async_trait::async_trait]
    impl DependencyProbe for FakeProbe {
        async fn check(&self, _ctx: &ProbeContext) -> Result<(), ProbeError> {
            match self {
                FakeProbe::Healthy => Ok(()),
                FakeProbe::Failing(detail) => Err(ProbeError::Failed(detail.to_string())),
                FakeProbe::Delayed(delay, failure) => {
                    tokio::time::sleep(*delay).await;
                    match failure {
                        Some(detail) => Err(ProbeError::Failed(detail.to_string())),
                        None => Ok(()),
                    }
                }
                FakeProbe::Blocked => std::future::pending().await,
                FakeProbe::Panicking => panic!("probe exploded"),
            }
        }
    }

    /// Never finishes; flags when its in-flight check is torn down.
    struct DropTrackingProbe {
        dropped: Arc<AtomicBool>,
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl DependencyProbe for DropTrackingProbe {
        async fn check(&self, _ctx: &ProbeContext) -> Result<(), ProbeError> {
            let _guard = SetOnDrop(self.dropped.clone());
            std::future::pending().await
        }
    }

    fn report_of(result: crate::Result<HealthReport>) -> HealthReport {
        match result {
            Ok(report) => report,
            Err(AppError::ServiceUnavailable(report)) => *report,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    fn names(report: &HealthReport) -> Vec<String> {
        report.outcomes().iter().map(|o| o.name.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_aggregator_is_configuration_error() {
        let aggregator = HealthAggregator::new();
        let result = aggregator.health_check(&ProbeContext::background()).await;

        match result {
            Err(AppError::Configuration(msg)) => assert_eq!(msg, "no dependencies registered"),
            other => panic!("expected configuration error, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_register_rejects_duplicates_and_empty_names() {
        let aggregator = HealthAggregator::new()
            .register("self", FakeProbe::Healthy)
            .unwrap();

        assert!(matches!(
            aggregator.register("self", FakeProbe::Healthy),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            HealthAggregator::new().register("", FakeProbe::Healthy),
            Err(AppError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_one_failing_dependency_makes_service_unavailable() {
        let aggregator = HealthAggregator::new()
            .register("self", SelfProbe::default())
            .unwrap()
            .register("task-manager-api", FakeProbe::Failing("connection refused"))
            .unwrap()
            .register("user-management-api", FakeProbe::Healthy)
            .unwrap();

        let result = aggregator
            .health_check(&ProbeContext::with_timeout(Duration::from_secs(5)))
            .await;

        let report = match result {
            Err(AppError::ServiceUnavailable(report)) => report,
            other => panic!("expected service unavailable, got {:?}", other.map(|r| r.len())),
        };

        assert_eq!(report.len(), 3);
        assert_eq!(report.overall(), HealthStatus::Unhealthy);
        assert_eq!(names(&report), vec!["self", "task-manager-api", "user-management-api"]);

        let entries = report.entries();
        assert_eq!(entries[0].status, HealthStatus::Healthy);
        assert_eq!(entries[1].status, HealthStatus::Unhealthy);
        assert_eq!(entries[1].message.as_deref(), Some("connection refused"));
        assert_eq!(entries[2].status, HealthStatus::Healthy);
        assert!(entries[2].message.is_none());
    }

    #[tokio::test]
    async fn test_all_healthy_returns_report() {
        let aggregator = HealthAggregator::new()
            .register("self", SelfProbe::default())
            .unwrap()
            .register("task-manager-api", FakeProbe::Healthy)
            .unwrap()
            .register("user-management-api", FakeProbe::Healthy)
            .unwrap();

        let report = aggregator
            .health_check(&ProbeContext::with_timeout(Duration::from_secs(5)))
            .await
            .expect("all dependencies are healthy");

        assert_eq!(report.len(), 3);
        assert!(report.is_healthy());
    }

    #[tokio::test]
    async fn test_verdict_over_all_health_combinations() {
        for n in 1..=4usize {
            for mask in 0u32..(1 << n) {
                let mut aggregator = HealthAggregator::new();
                for i in 0..n {
                    let probe = if mask & (1 << i) != 0 {
                        FakeProbe::Failing("down")
                    } else {
                        FakeProbe::Healthy
                    };
                    aggregator = aggregator.register(format!("dep-{}", i), probe).unwrap();
                }

                let result = aggregator
                    .health_check(&ProbeContext::with_timeout(Duration::from_secs(5)))
                    .await;
                assert_eq!(result.is_ok(), mask == 0, "n={} mask={:b}", n, mask);

                let report = report_of(result);
                assert_eq!(report.len(), n);
                for (i, outcome) in report.outcomes().iter().enumerate() {
                    assert_eq!(outcome.healthy, mask & (1 << i) == 0);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_blocked_dependency_does_not_hide_others() {
        let aggregator = HealthAggregator::new()
            .register("self", FakeProbe::Healthy)
            .unwrap()
            .register("stuck", FakeProbe::Blocked)
            .unwrap()
            .register("slow-but-fine", FakeProbe::Delayed(Duration::from_millis(20), None))
            .unwrap()
            .register("broken", FakeProbe::Failing("unexpected status code: 503"))
            .unwrap();

        let started = Instant::now();
        let result = aggregator
            .health_check(&ProbeContext::with_timeout(Duration::from_millis(300)))
            .await;
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_secs(2), "aggregator waited {:?}", elapsed);

        let report = report_of(result);
        assert_eq!(report.len(), 4);
        assert!(report.get("self").unwrap().healthy);
        assert!(report.get("slow-but-fine").unwrap().healthy);

        let broken = report.get("broken").unwrap();
        assert_eq!(broken.detail.as_deref(), Some("unexpected status code: 503"));

        let stuck = report.get("stuck").unwrap();
        assert!(!stuck.healthy);
        assert_eq!(stuck.detail.as_deref(), Some("deadline exceeded"));
    }

    #[tokio::test]
    async fn test_cancelled_context_still_yields_full_report() {
        let aggregator = HealthAggregator::new()
            .register("a", FakeProbe::Blocked)
            .unwrap()
            .register("b", FakeProbe::Blocked)
            .unwrap()
            .register("c", FakeProbe::Blocked)
            .unwrap();

        let ctx = ProbeContext::background();
        ctx.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), aggregator.health_check(&ctx))
            .await
            .expect("aggregator must not hang on a cancelled context");

        let report = report_of(result);
        assert_eq!(report.len(), 3);
        assert_eq!(names(&report), vec!["a", "b", "c"]);
        for outcome in report.outcomes() {
            assert!(!outcome.healthy);
            assert_eq!(outcome.detail.as_deref(), Some("context canceled"));
        }
    }

    #[tokio::test]
    async fn test_cancellation_mid_flight() {
        let aggregator = Arc::new(
            HealthAggregator::new()
                .register("fast", FakeProbe::Healthy)
                .unwrap()
                .register("stuck", FakeProbe::Blocked)
                .unwrap(),
        );

        let ctx = ProbeContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let report = report_of(aggregator.health_check(&ctx).await);
        assert_eq!(report.len(), 2);
        assert!(report.get("fast").unwrap().healthy);
        assert_eq!(report.get("stuck").unwrap().detail.as_deref(), Some("context canceled"));
    }

    #[tokio::test]
    async fn test_stragglers_are_cancelled_when_check_returns() {
        let dropped = Arc::new(AtomicBool::new(false));
        let aggregator = HealthAggregator::new()
            .register("cooperative", DropTrackingProbe { dropped: dropped.clone() })
            .unwrap();

        let report = report_of(
            aggregator
                .health_check(&ProbeContext::with_timeout(Duration::from_millis(30)))
                .await,
        );

        assert_eq!(report.len(), 1);
        assert_eq!(
            report.get("cooperative").unwrap().detail.as_deref(),
            Some("deadline exceeded")
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panicking_probe_is_isolated() {
        let aggregator = HealthAggregator::new()
            .register("self", FakeProbe::Healthy)
            .unwrap()
            .register("explodes", FakeProbe::Panicking)
            .unwrap()
            .register("fine", FakeProbe::Healthy)
            .unwrap();

        let report = report_of(
            aggregator
                .health_check(&ProbeContext::with_timeout(Duration::from_secs(5)))
                .await,
        );

        assert_eq!(report.len(), 3);
        assert_eq!(report.get("explodes").unwrap().detail.as_deref(), Some("probe panicked"));
        assert!(report.get("self").unwrap().healthy);
        assert!(report.get("fine").unwrap().healthy);
    }

    #[tokio::test]
    async fn test_order_is_registration_order_not_completion_order() {
        let aggregator = HealthAggregator::new()
            .register("slowest", FakeProbe::Delayed(Duration::from_millis(60), None))
            .unwrap()
            .register("middle", FakeProbe::Delayed(Duration::from_millis(30), Some("down")))
            .unwrap()
            .register("fastest", FakeProbe::Healthy)
            .unwrap();

        for _ in 0..5 {
            let report = report_of(
                aggregator
                    .health_check(&ProbeContext::with_timeout(Duration::from_secs(5)))
                    .await,
            );
            assert_eq!(names(&report), vec!["slowest", "middle", "fastest"]);
        }
    }

    #[tokio::test]
    async fn test_probes_run_concurrently() {
        let mut aggregator = HealthAggregator::new();
        for i in 0..5 {
            aggregator = aggregator
                .register(format!("dep-{}", i), FakeProbe::Delayed(Duration::from_millis(100), None))
                .unwrap();
        }

        let started = Instant::now();
        let report = aggregator
            .health_check(&ProbeContext::with_timeout(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(report.len(), 5);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_check_dependency() {
        let aggregator = HealthAggregator::new()
            .register("self", FakeProbe::Healthy)
            .unwrap()
            .register("stuck", FakeProbe::Blocked)
            .unwrap();

        let ctx = ProbeContext::with_timeout(Duration::from_millis(30));
        let outcome = aggregator.check_dependency(&ctx, "stuck").await.unwrap();
        assert!(!outcome.healthy);
        assert_eq!(outcome.detail.as_deref(), Some("deadline exceeded"));

        let ctx = ProbeContext::with_timeout(Duration::from_secs(1));
        assert!(aggregator.check_dependency(&ctx, "self").await.unwrap().healthy);
        assert!(aggregator.check_dependency(&ctx, "missing").await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_context_wins_over_ready_probe() {
        let aggregator = HealthAggregator::new()
            .register("ready", FakeProbe::Healthy)
            .unwrap();
        let ctx = ProbeContext::background();
        ctx.cancel();

        for _ in 0..50 {
            let outcome = aggregator.check_dependency(&ctx, "ready").await.unwrap();
            assert!(!outcome.healthy);
            assert_eq!(outcome.detail.as_deref(), Some("context canceled"));
        }
    }

    #[tokio::test]
    async fn test_from_config_registers_self_first() {
        let mut config = HealthConfig::default();
        config.urls = "http://task-manager-api/v1/health,,".to_string();
        config.dependencies = vec![DependencyConfig::grpc(
            "user-management-api",
            "http://user-management-api:50051",
        )];

        let aggregator = HealthAggregator::from_config(&config, CancellationToken::new()).unwrap();
        let registered: Vec<&str> = aggregator.names().map(|n| n.as_str()).collect();
        assert_eq!(
            registered,
            vec!["self", "user-management-api", "http://task-manager-api/v1/health"]
        );
    }

    #[tokio::test]
    async fn test_self_only_aggregator_reflects_shutdown() {
        let shutdown = CancellationToken::new();
        let aggregator =
            HealthAggregator::from_config(&HealthConfig::default(), shutdown.clone()).unwrap();
        assert_eq!(aggregator.len(), 1);

        let ctx = ProbeContext::with_timeout(Duration::from_secs(1));
        assert!(aggregator.health_check(&ctx).await.is_ok());

        shutdown.cancel();
        let report = report_of(aggregator.health_check(&ctx).await);
        assert_eq!(
            report.get("self").unwrap().detail.as_deref(),
            Some("service is shutting down")
        );
    }
}
