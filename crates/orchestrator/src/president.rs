use crate::config::OrchestratorConfig;
use crate::conflicts::{ConflictBoard, ConflictReport, ConflictSource};
use crate::dedupe::RecentRequests;
use crate::health::HealthSnapshot;
use crate::telemetry::{self, DecisionTimer};
use capitol_audit::SupremeCourt;
use capitol_core::{
    Branch, CancelToken, CostReceipt, EmergencyOrder, EmergencySnapshot, EmergencyState,
    EngineOutput, ExecutionRequest, ExecutionResponse, ExecutionResult, FailureKind, JobRequest,
    Metrics, ModelClass, ResponseMetadata, Stage, Tier,
};
use capitol_policy::{Congress, CostQuote, Verdict};
use capitol_registry::{Engine, EngineConflict, EngineContext, ModelCatalog, Router};
use capitol_store::ChargeOutcome;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

const PRE_CHECK_BLOCKED: &str = "Request rejected: constitutional review failed";
const POST_CHECK_BLOCKED: &str = "Output withheld: constitutional violation detected";

/// Per-request bookkeeping that ends up in [`ResponseMetadata`].
struct Trace {
    request_id: String,
    timer: DecisionTimer,
    branches: Vec<Branch>,
    stage: Stage,
    audited: bool,
    surge: bool,
    engine: Option<String>,
    model: Option<String>,
}

impl Trace {
    fn new(request_id: String) -> Self {
        Self {
            request_id,
            timer: DecisionTimer::start(),
            branches: Vec::new(),
            stage: Stage::Received,
            audited: false,
            surge: false,
            engine: None,
            model: None,
        }
    }

    fn respond(&self, approved: bool) -> ExecutionResponse {
        ExecutionResponse {
            request_id: self.request_id.clone(),
            approved,
            engine: self.engine.clone(),
            model: self.model.clone(),
            result: None,
            error: None,
            failure: None,
            upgrade_prompt: None,
            violations: Vec::new(),
            cost: CostReceipt::default(),
            metadata: ResponseMetadata {
                decision_time_ms: self.timer.elapsed_ms(),
                audited: self.audited,
                branch_approvals: self.branches.clone(),
                stage: self.stage,
                surge: self.surge,
            },
        }
    }

    fn fail(&self, failure: FailureKind, error: impl Into<String>) -> ExecutionResponse {
        let mut response = self.respond(false);
        response.failure = Some(failure);
        response.error = Some(error.into());
        response
    }
}

/// Orchestrator: the only entry point callers see. Sequences routing,
/// policy, audit, execution and settlement for each request and turns every
/// failure into an [`ExecutionResponse`].
pub struct President {
    router: Router,
    congress: Arc<Congress>,
    court: Arc<SupremeCourt>,
    models: ModelCatalog,
    emergency: Arc<EmergencyState>,
    metrics: Arc<Metrics>,
    config: OrchestratorConfig,
    recent: RecentRequests,
    conflicts: ConflictBoard,
    limiter: Arc<Semaphore>,
}

impl President {
    /// `emergency` must be the same state `congress` was built with, so that
    /// surge protection orders reach pricing.
    pub fn new(
        router: Router,
        congress: Arc<Congress>,
        court: Arc<SupremeCourt>,
        emergency: Arc<EmergencyState>,
        config: OrchestratorConfig,
    ) -> Self {
        let conflicts = ConflictBoard::new();
        for conflict in router.registry().conflicts() {
            conflicts.record(conflict, ConflictSource::Startup);
        }
        Self {
            recent: RecentRequests::new(config.dedupe_capacity),
            limiter: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            router,
            congress,
            court,
            models: ModelCatalog::default(),
            emergency,
            metrics: Metrics::new(),
            config,
            conflicts,
        }
    }

    pub fn with_models(mut self, models: ModelCatalog) -> Self {
        self.models = models;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn congress(&self) -> &Arc<Congress> {
        &self.congress
    }

    pub fn court(&self) -> &Arc<SupremeCourt> {
        &self.court
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub async fn execute_request(&self, job: JobRequest) -> ExecutionResponse {
        self.execute_request_with_cancel(job, &CancelToken::new())
            .await
    }

    /// Like [`execute_request`](Self::execute_request); `cancel` is honoured
    /// up to the moment the engine starts.
    pub async fn execute_request_with_cancel(
        &self,
        job: JobRequest,
        cancel: &CancelToken,
    ) -> ExecutionResponse {
        self.metrics.inc_requests();
        let caller_id = job.request_id.is_some();
        let request_id = job
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut trace = Trace::new(request_id);

        let _permit = match self.limiter.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                let response = trace.fail(FailureKind::EmergencyHalt, "Orchestrator is closed");
                return self.finish(response);
            }
        };

        info!(
            "Processing request {}: user={}, action={}",
            trace.request_id, job.user_id, job.action
        );
        let response = self.run_pipeline(job, caller_id, cancel, &mut trace).await;
        self.finish(response)
    }

    async fn run_pipeline(
        &self,
        job: JobRequest,
        caller_id: bool,
        cancel: &CancelToken,
        trace: &mut Trace,
    ) -> ExecutionResponse {
        let admission = self.congress.check_admission();
        if !admission.allowed {
            let reason = admission
                .reason
                .unwrap_or_else(|| "New work is not being admitted".to_string());
            warn!("Request {} halted: {}", trace.request_id, reason);
            return trace.fail(FailureKind::EmergencyHalt, reason);
        }

        if caller_id && !self.recent.insert(&trace.request_id) {
            warn!("Duplicate request id {}", trace.request_id);
            return trace.fail(
                FailureKind::DuplicateRequest,
                format!("Request {} was already submitted", trace.request_id),
            );
        }

        // ROUTED
        let Some(route) = self
            .router
            .find_engine(&job.action, job.sub_type.as_deref())
        else {
            self.metrics.inc_routing_misses();
            warn!("No engine handles job type '{}'", job.action);
            return trace.fail(
                FailureKind::EngineNotFound,
                format!("No engine handles job type '{}'", job.action),
            );
        };
        let engine = route.engine.clone();
        let engine_id = engine.id().to_string();
        trace.engine = Some(engine_id.clone());
        trace.stage = Stage::Routed;

        // PERMITTED
        trace.branches.push(Branch::Congress);
        let tier = self.congress.resolve_tier(&job.user_id).await;
        let request = ExecutionRequest::from_job(
            job,
            trace.request_id.clone(),
            tier.as_ref().copied().unwrap_or(Tier::Free),
        );
        if let Err(e) = tier {
            let reason = e.to_string();
            warn!("Request {} denied: {}", request.request_id, reason);
            self.congress
                .record_decision(&request, Some(&engine_id), false, Some(&reason))
                .await;
            self.metrics.inc_policy_denials();
            return trace.fail(FailureKind::PolicyDenied, reason);
        }

        let quote = match self.congress.evaluate(&request, &engine_id, None).await {
            Verdict::Approved(quote) => quote,
            Verdict::Denied {
                failure,
                reason,
                upgrade_prompt,
            } => {
                info!("Request {} denied by policy: {}", request.request_id, reason);
                self.congress
                    .record_decision(&request, Some(&engine_id), false, Some(&reason))
                    .await;
                self.metrics.inc_policy_denials();
                let mut response = trace.fail(failure, reason);
                response.upgrade_prompt = upgrade_prompt;
                return response;
            }
        };
        self.congress
            .record_decision(&request, Some(&engine_id), true, None)
            .await;
        trace.surge = quote.surge;
        trace.stage = Stage::Permitted;

        // AUDITED_PRE
        let verdict = self.court.pre_check(&request, &engine_id).await;
        trace.audited = true;
        trace.branches.push(Branch::SupremeCourt);
        if !verdict.allowed {
            self.metrics.inc_audit_blocks();
            let mut response = trace.fail(FailureKind::PreCheckBlocked, PRE_CHECK_BLOCKED);
            response.violations = verdict.report.violation_summary();
            return response;
        }
        trace.stage = Stage::AuditedPre;

        if cancel.is_cancelled() {
            info!("Request {} cancelled before execution", request.request_id);
            return trace.fail(FailureKind::Cancelled, "Request cancelled before execution");
        }

        // EXECUTED
        let model_class = self.dispatch_class(engine.descriptor().model_class);
        let model = self.models.model_for(model_class).to_string();
        trace.model = Some(model.clone());
        let ctx = EngineContext::new(
            &request,
            model.clone(),
            model_class,
            self.config.engine_timeout_ms,
        );

        self.metrics.inc_engine_executions();
        let started = Instant::now();
        let output = self.run_engine(engine, ctx).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        telemetry::record_engine_latency(&engine_id, elapsed_ms as f64);
        trace.branches.push(Branch::President);

        let output = match output {
            Ok(output) => output,
            Err(reason) => {
                self.metrics.inc_engine_failures();
                error!("Engine {} failed: {}", engine_id, reason);
                return trace.fail(FailureKind::EngineExecutionFailed, reason);
            }
        };
        trace.stage = Stage::Executed;

        let settled_quote = self
            .congress
            .reprice(&request.job_type, output.energy_consumed, &quote);
        let result = self.build_result(
            &engine_id,
            model,
            model_class,
            output,
            &settled_quote,
            elapsed_ms,
        );
        trace.model = Some(result.model_used.clone());

        // AUDITED_POST
        let report = self
            .court
            .audit_execution(&result, request.require_quality)
            .await;
        if self.court.should_block_execution(&report) {
            self.metrics.inc_audit_blocks();
            warn!(
                "Output of {} for request {} blocked: {}",
                engine_id,
                request.request_id,
                report.violation_summary().join(", ")
            );
            let mut response = trace.fail(FailureKind::PostCheckBlocked, POST_CHECK_BLOCKED);
            response.violations = report.violation_summary();
            return response;
        }
        trace.stage = Stage::AuditedPost;

        // SETTLED
        match self
            .congress
            .settle_cost(&request.user_id, request.tier, &request.job_type, &settled_quote)
            .await
        {
            Ok(ChargeOutcome::Charged(_)) => {
                self.metrics
                    .add_settled(settled_quote.coins, settled_quote.energy);
                trace.stage = Stage::Settled;
                let mut response = trace.respond(true);
                response.result = Some(result.result);
                response.violations = result.violations;
                response.cost = CostReceipt {
                    energy: settled_quote.energy,
                    tokens: result.tokens_used,
                    coins: settled_quote.coins,
                };
                response
            }
            Ok(ChargeOutcome::Insufficient(balances)) => trace.fail(
                FailureKind::InsufficientBalance,
                format!(
                    "Insufficient balance at settlement: need {} coins / {} energy, have {} / {}",
                    settled_quote.coins, settled_quote.energy, balances.coins, balances.energy
                ),
            ),
            Err(e) => {
                error!("Settlement for {} failed: {}", request.request_id, e);
                trace.fail(FailureKind::InsufficientBalance, "Unable to settle cost")
            }
        }
    }

    fn finish(&self, response: ExecutionResponse) -> ExecutionResponse {
        if response.approved {
            self.metrics.inc_approvals();
        }
        telemetry::increment_outcome(response.failure);
        debug!(
            "Request {} finished at {:?} in {}ms",
            response.request_id, response.metadata.stage, response.metadata.decision_time_ms
        );
        response
    }

    /// Rollback pins premium engines to the standard model.
    fn dispatch_class(&self, class: ModelClass) -> ModelClass {
        if class == ModelClass::Premium && self.emergency.is_active(EmergencyOrder::Rollback) {
            ModelClass::Standard
        } else {
            class
        }
    }

    async fn run_engine(
        &self,
        engine: Arc<dyn Engine>,
        ctx: EngineContext,
    ) -> Result<EngineOutput, String> {
        let timeout_ms = ctx.timeout_ms;

        // Spawn to isolate panics
        let handle = tokio::spawn(async move { engine.run(ctx).await });
        let abort = handle.abort_handle();

        match timeout(Duration::from_millis(timeout_ms), handle).await {
            Ok(Ok(Ok(output))) if output.success => Ok(output),
            Ok(Ok(Ok(output))) => Err(output
                .error
                .unwrap_or_else(|| "Engine reported failure".to_string())),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(join_err)) => {
                if join_err.is_panic() {
                    error!("Engine execution panicked");
                    Err("Engine panicked".to_string())
                } else {
                    Err("Engine task cancelled".to_string())
                }
            }
            Err(_) => {
                abort.abort();
                warn!("Engine execution timed out after {}ms", timeout_ms);
                Err(format!("Engine timed out after {timeout_ms}ms"))
            }
        }
    }

    fn build_result(
        &self,
        engine_id: &str,
        model: String,
        model_class: ModelClass,
        output: EngineOutput,
        quote: &CostQuote,
        elapsed_ms: u64,
    ) -> ExecutionResult {
        let mut result = ExecutionResult::new(engine_id, output.model_used.unwrap_or(model));
        result.tokens_used = output.tokens_used.unwrap_or(0);
        result.cost_usd = self
            .models
            .cost_usd(model_class, &result.model_used, result.tokens_used);
        result.result = output.result;
        result.energy_consumed = quote.energy;
        result.execution_time_ms = elapsed_ms;
        result.ai_generated = output.ai_generated;
        result
    }

    /// Returns whether the order was already in force.
    pub fn issue_emergency_order(&self, order: EmergencyOrder) -> bool {
        let already = self.emergency.apply(order);
        warn!("Emergency order issued: {}", order);
        telemetry::increment_emergency_order(order.as_str());
        already
    }

    /// Returns whether the order was in force.
    pub fn lift_emergency_order(&self, order: EmergencyOrder) -> bool {
        let was_active = self.emergency.lift(order);
        if was_active {
            info!("Emergency order lifted: {}", order);
        }
        was_active
    }

    pub fn emergency_status(&self) -> EmergencySnapshot {
        self.emergency.snapshot()
    }

    /// Logs an overlap seen at runtime for manual resolution. Routing is not
    /// changed.
    pub fn report_conflict(
        &self,
        job_type: &str,
        sub_type: Option<&str>,
        engines: Vec<String>,
    ) -> ConflictReport {
        self.conflicts.record(
            EngineConflict {
                job_type: job_type.to_string(),
                sub_type: sub_type.map(String::from),
                engines,
            },
            ConflictSource::Runtime,
        )
    }

    pub fn pending_conflicts(&self) -> Vec<ConflictReport> {
        self.conflicts.pending()
    }

    pub fn resolve_conflict(&self, conflict_id: &str) -> bool {
        self.conflicts.resolve(conflict_id)
    }

    pub async fn health_snapshot(&self) -> HealthSnapshot {
        let metrics = self.metrics.snapshot();
        let failed_engines = self.court.failed_engines().await.unwrap_or_else(|e| {
            warn!("Engine health unavailable: {}", e);
            Vec::new()
        });
        let compliance_score = match self.court.compliance_score().await {
            Ok(score) => Some(score),
            Err(e) => {
                warn!("Compliance score unavailable: {}", e);
                None
            }
        };
        let in_flight = self
            .config
            .max_concurrent
            .max(1)
            .saturating_sub(self.limiter.available_permits());

        HealthSnapshot {
            emergency: self.emergency.snapshot(),
            approval_rate: metrics.approval_rate(),
            engine_success_rate: metrics.engine_success_rate(),
            metrics,
            engines_registered: self.router.registry().count(),
            failed_engines,
            compliance_score,
            surge_active: self.congress.is_surge_active().await,
            pending_conflicts: self.conflicts.pending().len(),
            in_flight,
        }
    }
}
