//! Built-in engine catalogue. The engines are deterministic stand-ins for
//! the production AI services: they honour the engine contract (result,
//! token and energy accounting, model echo) without generating anything.

use capitol_core::{EngineDescriptor, EngineOutput, ModelClass};
use capitol_registry::{Engine, EngineContext, EngineError, EngineRegistry, FnEngine};
use serde_json::{json, Value};
use std::sync::Arc;

fn field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

/// Rough token count for stand-in output.
fn tokens_for(text: &str) -> u64 {
    (text.chars().count() as u64 / 4).max(1)
}

fn scan(ctx: EngineContext) -> Result<EngineOutput, EngineError> {
    let url = field(&ctx.payload, "url")
        .ok_or_else(|| EngineError::Validation("scan requires a 'url'".to_string()))?;
    let summary = format!("Scanned {url}. Found a landing page, pricing and a contact form.");
    Ok(EngineOutput::ok(json!({ "url": url, "summary": summary }))
        .with_tokens(tokens_for(&summary))
        .with_model(ctx.model))
}

fn message(ctx: EngineContext) -> Result<EngineOutput, EngineError> {
    let name = field(&ctx.payload, "name").unwrap_or("there");
    let topic = field(&ctx.payload, "topic").unwrap_or("your work");
    let text = format!("Hi {name}, I enjoyed reading about {topic}. Would you be open to a chat?");
    Ok(EngineOutput::ok(json!(text))
        .with_tokens(tokens_for(&text))
        .with_model(ctx.model)
        .generated())
}

fn chatbot(ctx: EngineContext) -> Result<EngineOutput, EngineError> {
    let question = field(&ctx.payload, "message").unwrap_or_default();
    if question.trim().is_empty() {
        return Err(EngineError::Validation("chatbot requires a 'message'".to_string()));
    }
    let text = format!("Thanks for asking. Here is what I can share about: {question}.");
    Ok(EngineOutput::ok(json!(text))
        .with_tokens(tokens_for(&text))
        .with_model(ctx.model)
        .generated())
}

fn company_intelligence(ctx: EngineContext) -> Result<EngineOutput, EngineError> {
    let company = field(&ctx.payload, "company").ok_or_else(|| {
        EngineError::Validation("company_intelligence requires a 'company'".to_string())
    })?;
    let report = json!({
        "company": company,
        "sections": ["overview", "products", "leadership", "signals"],
        "summary": format!("{company} profile assembled from public sources."),
    });
    Ok(EngineOutput::ok(report)
        .with_tokens(1_200)
        .with_energy(25)
        .with_model(ctx.model)
        .generated())
}

fn prospect(ctx: EngineContext) -> Result<EngineOutput, EngineError> {
    let industry = field(&ctx.payload, "industry").unwrap_or("software");
    let leads: Vec<Value> = (1..=3)
        .map(|n| json!({ "name": format!("{industry} lead {n}"), "score": 90 - n * 10 }))
        .collect();
    Ok(EngineOutput::ok(json!({ "industry": industry, "leads": leads }))
        .with_tokens(300)
        .with_model(ctx.model))
}

fn engine(
    descriptor: EngineDescriptor,
    handler: fn(EngineContext) -> Result<EngineOutput, EngineError>,
) -> Arc<dyn Engine> {
    Arc::new(FnEngine::new(descriptor, move |ctx| async move { handler(ctx) }))
}

/// The five production engines in routing priority order.
pub fn builtin_engines() -> Vec<Arc<dyn Engine>> {
    vec![
        engine(
            EngineDescriptor::new("scan_engine", "intelligence", ModelClass::Cheap)
                .with_job_type("scan")
                .with_sub_type("website")
                .with_sub_type("company"),
            scan,
        ),
        engine(
            EngineDescriptor::new("message_engine", "outreach", ModelClass::Standard)
                .with_job_type("message")
                .with_sub_type("linkedin")
                .with_sub_type("email"),
            message,
        ),
        engine(
            EngineDescriptor::new("chatbot_engine", "support", ModelClass::Cheap)
                .with_job_type("chatbot"),
            chatbot,
        ),
        engine(
            EngineDescriptor::new("company_intel_engine", "intelligence", ModelClass::Premium)
                .with_job_type("company_intelligence"),
            company_intelligence,
        ),
        engine(
            EngineDescriptor::new("prospect_engine", "growth", ModelClass::Standard)
                .with_job_type("prospect"),
            prospect,
        ),
    ]
}

pub fn builtin_registry() -> Result<EngineRegistry, capitol_registry::RegistryError> {
    let mut registry = EngineRegistry::new();
    for engine in builtin_engines() {
        registry.register(engine)?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalogue_has_no_conflicts() {
        let registry = builtin_registry().unwrap();
        assert_eq!(registry.count(), 5);
        assert!(registry.conflicts().is_empty());
    }

    #[test]
    fn test_token_estimate_floor() {
        assert_eq!(tokens_for(""), 1);
        assert_eq!(tokens_for("abcdefgh"), 2);
    }
}
