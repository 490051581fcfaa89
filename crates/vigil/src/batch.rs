//! Concurrent analysis of several contracts.

use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::AnalysisConfig;
use crate::contract::ContractRef;
use crate::controller::AnalysisController;
use crate::error::{AnalysisError, AnalysisResult};
use crate::policy::DecisionPolicy;
use crate::session::SessionReport;
use crate::tools::ToolRegistry;

/// Analyse every contract, at most `config.max_concurrent_sessions` at a time.
///
/// Sessions share only the registry and the policy. Results are returned in
/// input order; one failing session does not affect the others.
pub async fn analyze_all(
    registry: Arc<ToolRegistry>,
    policy: Arc<dyn DecisionPolicy>,
    config: AnalysisConfig,
    contracts: Vec<ContractRef>,
) -> Vec<AnalysisResult<SessionReport>> {
    let permits = Arc::new(Semaphore::new(config.max_concurrent_sessions.max(1)));

    let runs = contracts.into_iter().map(|contract| {
        run_bounded(
            Arc::clone(&permits),
            Arc::clone(&registry),
            Arc::clone(&policy),
            config.clone(),
            contract,
        )
    });

    join_all(runs).await
}

async fn run_bounded(
    permits: Arc<Semaphore>,
    registry: Arc<ToolRegistry>,
    policy: Arc<dyn DecisionPolicy>,
    config: AnalysisConfig,
    contract: ContractRef,
) -> AnalysisResult<SessionReport> {
    let _permit = permits
        .acquire_owned()
        .await
        .map_err(|_| AnalysisError::LimiterClosed)?;
    let mut controller = AnalysisController::new(registry, policy, config, contract)?;
    controller.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Finding, FindingCategory, Severity};
    use crate::policy::{CoveragePolicy, Decision, PolicyError, PolicyInput};
    use crate::session::SessionStatus;
    use crate::tools::{Tool, ToolCategory, ToolError, ToolOutput};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records the highest number of overlapping calls.
    struct GaugeTool {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Tool for GaugeTool {
        fn name(&self) -> &str {
            "gauge"
        }

        fn category(&self) -> ToolCategory {
            ToolCategory::SourceCode
        }

        async fn execute(
            &self,
            contract: &ContractRef,
            _evidence_summary: &str,
        ) -> Result<ToolOutput, ToolError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(ToolOutput::new(
                json!({}),
                vec![Finding::new(
                    FindingCategory::AccessControl,
                    Severity::Low,
                    "gauge",
                    format!("checked {}", contract.address()),
                )],
            ))
        }
    }

    struct RejectingPolicy;

    #[async_trait]
    impl DecisionPolicy for RejectingPolicy {
        fn id(&self) -> &str {
            "rejecting"
        }

        async fn decide(&self, _input: &PolicyInput) -> Result<Decision, PolicyError> {
            Err(PolicyError::Unavailable("offline".to_string()))
        }

        fn expected_tools(&self) -> Vec<String> {
            vec!["absent".to_string()]
        }
    }

    fn gauge_registry() -> (Arc<GaugeTool>, Arc<ToolRegistry>) {
        let tool = Arc::new(GaugeTool {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let registry = ToolRegistry::builder()
            .register(Arc::clone(&tool) as Arc<dyn Tool>)
            .expect("register")
            .build();
        (tool, Arc::new(registry))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn respects_concurrency_limit_and_input_order() {
        let (tool, registry) = gauge_registry();
        let config = AnalysisConfig {
            max_concurrent_sessions: 2,
            ..AnalysisConfig::default()
        };
        let contracts: Vec<ContractRef> = (0..6)
            .map(|i| ContractRef::new(format!("0x{i}")))
            .collect();

        let reports = analyze_all(registry, Arc::new(CoveragePolicy), config, contracts).await;

        assert_eq!(reports.len(), 6);
        for (i, report) in reports.into_iter().enumerate() {
            let report = report.expect("report");
            assert_eq!(report.contract.address(), format!("0x{i}"));
            assert_eq!(report.status, SessionStatus::StoppedConverged);
            assert_eq!(report.iteration_count, 1);
        }
        assert!(tool.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn construction_errors_are_reported_per_contract() {
        let (_tool, registry) = gauge_registry();
        let reports = analyze_all(
            registry,
            Arc::new(RejectingPolicy),
            AnalysisConfig::default(),
            vec![ContractRef::new("0x1"), ContractRef::new("0x2")],
        )
        .await;

        assert_eq!(reports.len(), 2);
        assert!(reports
            .iter()
            .all(|r| matches!(r, Err(AnalysisError::UnknownTool(name)) if name == "absent")));
    }

    #[tokio::test]
    async fn closed_limiter_is_reported() {
        let (tool, registry) = gauge_registry();
        let permits = Arc::new(Semaphore::new(1));
        permits.close();

        let result = run_bounded(
            permits,
            registry,
            Arc::new(CoveragePolicy),
            AnalysisConfig::default(),
            ContractRef::new("0x1"),
        )
        .await;

        assert!(matches!(result, Err(AnalysisError::LimiterClosed)));
        assert_eq!(tool.peak.load(Ordering::SeqCst), 0);
    }
}
