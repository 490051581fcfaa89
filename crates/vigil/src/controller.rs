//! Analysis controller: the state machine driving one session.

use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::assessment::{AssessmentWriter, FindingAggregator, RiskScorer};
use crate::config::AnalysisConfig;
use crate::contract::ContractRef;
use crate::error::{AnalysisError, AnalysisResult};
use crate::policy::{
    coverage_decision, Decision, DecisionOrigin, DecisionPolicy, GuardedDecision, PolicyInput,
    SelectionGuard,
};
use crate::session::{AnalysisSession, SessionReport, SessionStatus, TerminationReason};
use crate::tools::{execute_tool, ToolInvocationRecord, ToolRegistry};

/// Policy failures in a row that end a session.
const MAX_CONSECUTIVE_POLICY_FAILURES: usize = 2;

/// What a single [`AnalysisController::step`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A tool ran and its record was appended.
    Executed {
        ordinal: usize,
        tool: String,
        origin: DecisionOrigin,
        success: bool,
    },
    /// The session reached a terminal state during this step.
    Finished {
        status: SessionStatus,
        reason: TerminationReason,
    },
}

/// Owns one [`AnalysisSession`] and advances it one iteration at a time.
pub struct AnalysisController {
    registry: Arc<ToolRegistry>,
    guard: SelectionGuard,
    config: AnalysisConfig,
    aggregator: FindingAggregator,
    scorer: RiskScorer,
    session: AnalysisSession,
    policy_failures: usize,
    cancel_token: CancellationToken,
    writer: Option<AssessmentWriter>,
}

impl AnalysisController {
    /// Build a controller for `contract`.
    ///
    /// Fails when the configuration is invalid, the registry is empty, or the
    /// policy expects a tool the registry does not hold.
    pub fn new(
        registry: Arc<ToolRegistry>,
        policy: Arc<dyn DecisionPolicy>,
        config: AnalysisConfig,
        contract: ContractRef,
    ) -> AnalysisResult<Self> {
        config.validate()?;
        if registry.is_empty() {
            return Err(AnalysisError::EmptyRegistry);
        }
        if let Some(missing) = policy
            .expected_tools()
            .into_iter()
            .find(|name| !registry.contains(name))
        {
            return Err(AnalysisError::UnknownTool(missing));
        }

        let session = AnalysisSession::new(contract);
        tracing::debug!(
            session_id = session.id(),
            policy = policy.id(),
            tools = registry.len(),
            "analysis session created"
        );
        Ok(Self {
            guard: SelectionGuard::new(policy, config.repeat_threshold),
            scorer: RiskScorer::from_config(&config),
            aggregator: FindingAggregator::new(),
            registry,
            config,
            session,
            policy_failures: 0,
            cancel_token: CancellationToken::new(),
            writer: None,
        })
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Ask `writer` for a closing assessment once [`run`](Self::run) finishes.
    /// Its failure is recorded in the report and does not fail the run.
    pub fn with_assessment_writer(mut self, writer: AssessmentWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Token that cancels this session. Cancellation takes effect between
    /// iterations; an in-flight tool call is allowed to finish or time out
    /// and its record is kept.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn session(&self) -> &AnalysisSession {
        &self.session
    }

    pub fn into_session(self) -> AnalysisSession {
        self.session
    }

    pub fn report(&self) -> AnalysisResult<SessionReport> {
        self.session.report()
    }

    /// Run until the session is terminal and return its report.
    #[tracing::instrument(
        skip_all,
        fields(session_id = %self.session.id(), contract = %self.session.contract().address())
    )]
    pub async fn run(&mut self) -> AnalysisResult<SessionReport> {
        loop {
            if let StepOutcome::Finished { status, reason } = self.step().await? {
                tracing::info!(
                    %status,
                    %reason,
                    iterations = self.session.iteration_count(),
                    score = self.session.risk().score,
                    tier = %self.session.risk().tier,
                    "analysis finished"
                );
                break;
            }
        }
        if let Some(writer) = &self.writer {
            let report = self.session.report()?;
            let assessment = writer.write(&report).await;
            self.session.set_final_assessment(assessment);
        }
        self.session.report()
    }

    /// Advance the session by one iteration.
    ///
    /// Fails with [`AnalysisError::SessionClosed`] on a terminal session and
    /// with [`AnalysisError::UnknownTool`] if a validated tool name cannot be
    /// resolved; the latter also ends the session.
    pub async fn step(&mut self) -> AnalysisResult<StepOutcome> {
        self.session.ensure_open()?;
        self.session.begin();

        if self.cancel_token.is_cancelled() {
            return Ok(self.finish(TerminationReason::Cancelled));
        }

        let input = self.policy_input();
        let (guarded, policy_error) = match self.guard.propose(&input).await {
            Ok(guarded) => {
                self.policy_failures = 0;
                (guarded, None)
            }
            Err(error) => {
                self.policy_failures += 1;
                tracing::warn!(
                    session_id = self.session.id(),
                    iteration = input.iteration,
                    failures = self.policy_failures,
                    %error,
                    "decision policy failed"
                );
                if self.policy_failures >= MAX_CONSECUTIVE_POLICY_FAILURES {
                    return Ok(self.finish(TerminationReason::PolicyFailures {
                        last_error: error.to_string(),
                    }));
                }
                let mut decision = coverage_decision(&input);
                if let Decision::ChooseTool { rationale, .. } = &mut decision {
                    rationale.push_str(&format!(" (after {error})"));
                }
                let fallback = GuardedDecision {
                    decision,
                    origin: DecisionOrigin::Fallback,
                };
                (fallback, Some(error.to_string()))
            }
        };

        match guarded.decision {
            Decision::Stop { rationale } => {
                let reason = match policy_error {
                    Some(policy_error) => TerminationReason::FallbackStopped {
                        policy_error,
                        rationale,
                    },
                    None => TerminationReason::PolicyStopped { rationale },
                };
                Ok(self.finish(reason))
            }
            Decision::ChooseTool { name, rationale } => {
                self.execute(name, rationale, guarded.origin, &input).await
            }
        }
    }

    async fn execute(
        &mut self,
        name: String,
        rationale: String,
        origin: DecisionOrigin,
        input: &PolicyInput,
    ) -> AnalysisResult<StepOutcome> {
        let tool = match self.registry.lookup(&name) {
            Ok(tool) => tool,
            Err(err) => {
                self.finish(TerminationReason::UnknownTool { name });
                return Err(err);
            }
        };

        tracing::debug!(
            session_id = self.session.id(),
            iteration = input.iteration,
            tool = %name,
            ?origin,
            "executing tool"
        );
        let result = execute_tool(
            tool.as_ref(),
            self.session.contract(),
            &input.ledger_summary,
            self.config.per_tool_timeout,
        )
        .await;

        let record = ToolInvocationRecord {
            ordinal: 0,
            tool_name: name.clone(),
            category: tool.category(),
            arguments: json!({
                "contract": self.session.contract().address(),
                "deploy_block": self.session.contract().deploy_block(),
                "network": self.session.contract().network(),
                "block": self.session.contract().block(),
                "evidence_summary": input.ledger_summary,
            }),
            started_at: result.started_at,
            duration_ms: result.duration_ms,
            outcome: result.outcome,
            findings: result.findings,
            rationale,
            origin,
        };
        let (ordinal, success) = {
            let appended = self.session.append_record(record);
            (appended.ordinal, appended.is_success())
        };

        let findings = self.aggregator.aggregate(self.session.ledger());
        let risk = self.scorer.score(&findings);
        self.session.set_assessment(findings, risk);

        if self.cancel_token.is_cancelled() {
            return Ok(self.finish(TerminationReason::Cancelled));
        }
        if self.session.iteration_count() >= self.config.max_iterations {
            return Ok(self.finish(TerminationReason::MaxIterations {
                limit: self.config.max_iterations,
            }));
        }

        Ok(StepOutcome::Executed {
            ordinal,
            tool: name,
            origin,
            success,
        })
    }

    fn policy_input(&self) -> PolicyInput {
        let ledger = self.session.ledger();
        PolicyInput {
            contract: self.session.contract().clone(),
            ledger_summary: ledger
                .summarize(self.config.summary_max_entries, self.config.summary_max_chars),
            available_tools: self.registry.specs(),
            tools_used: ledger.tools_used(),
            category_counts: ledger.category_counts(),
            finding_count: ledger.finding_count(),
            iteration: self.session.iteration_count() + 1,
            max_iterations: self.config.max_iterations,
        }
    }

    fn finish(&mut self, reason: TerminationReason) -> StepOutcome {
        self.session.finish(reason.clone());
        StepOutcome::Finished {
            status: self.session.status(),
            reason,
        }
    }
}
