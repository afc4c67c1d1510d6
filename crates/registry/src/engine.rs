use crate::error::EngineError;
use async_trait::async_trait;
use capitol_core::{EngineDescriptor, EngineOutput, ExecutionRequest, ModelClass, Tier};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Everything an engine sees of one admitted request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineContext {
    pub request_id: String,
    pub user_id: String,
    pub tier: Tier,
    pub job_type: String,
    pub sub_type: Option<String>,
    pub payload: serde_json::Value,
    pub context: Option<serde_json::Value>,
    /// Concrete model the engine should call.
    pub model: String,
    pub model_class: ModelClass,
    pub timeout_ms: u64,
    pub audit_ref: String,
}

impl EngineContext {
    pub fn new(
        request: &ExecutionRequest,
        model: impl Into<String>,
        model_class: ModelClass,
        timeout_ms: u64,
    ) -> Self {
        Self {
            request_id: request.request_id.clone(),
            user_id: request.user_id.clone(),
            tier: request.tier,
            job_type: request.job_type.clone(),
            sub_type: request.sub_type.clone(),
            payload: request.payload.clone(),
            context: request.context.clone(),
            model: model.into(),
            model_class,
            timeout_ms,
            audit_ref: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// An AI engine behind the governance pipeline. Opaque apart from its
/// descriptor and its output contract.
#[async_trait]
pub trait Engine: Send + Sync {
    fn descriptor(&self) -> &EngineDescriptor;

    async fn run(&self, ctx: EngineContext) -> Result<EngineOutput, EngineError>;

    fn id(&self) -> &str {
        &self.descriptor().id
    }
}

type EngineFuture = Pin<Box<dyn Future<Output = Result<EngineOutput, EngineError>> + Send>>;

/// Adapts a closure into an [`Engine`].
pub struct FnEngine {
    descriptor: EngineDescriptor,
    handler: Arc<dyn Fn(EngineContext) -> EngineFuture + Send + Sync>,
}

impl FnEngine {
    pub fn new<F, Fut>(descriptor: EngineDescriptor, handler: F) -> Self
    where
        F: Fn(EngineContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<EngineOutput, EngineError>> + Send + 'static,
    {
        Self {
            descriptor,
            handler: Arc::new(move |ctx| Box::pin(handler(ctx))),
        }
    }
}

#[async_trait]
impl Engine for FnEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: EngineContext) -> Result<EngineOutput, EngineError> {
        (self.handler)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capitol_core::JobRequest;

    #[tokio::test]
    async fn test_fn_engine_sees_context() {
        let engine = FnEngine::new(
            EngineDescriptor::new("echo_engine", "support", ModelClass::Cheap)
                .with_job_type("echo"),
            |ctx: EngineContext| async move {
                Ok(EngineOutput::ok(ctx.payload).with_model(ctx.model))
            },
        );

        let job = JobRequest::new("u1", "support", "echo")
            .with_payload(serde_json::json!({"text": "hello"}));
        let request = ExecutionRequest::from_job(job, "req-1".to_string(), Tier::Pro);
        let ctx = EngineContext::new(&request, "gpt-4o-mini", ModelClass::Cheap, 1_000);
        assert!(!ctx.audit_ref.is_empty());

        let output = engine.run(ctx).await.unwrap();
        assert!(output.success);
        assert_eq!(output.result["text"], "hello");
        assert_eq!(output.model_used.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(engine.id(), "echo_engine");
    }
}
