//! Route classification for incoming questions.
//!
//! The router asks the language model to pick one of five mutually
//! exclusive evidence routes and validates the structured reply eagerly at
//! this boundary. A reply that cannot be parsed, or whose fields fall
//! outside the enumerated values, is a [`EngineError::RoutingDecode`]
//! failure; the router never substitutes a default route.

use std::sync::Arc;

use anyhow::Result;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::EngineError;
use crate::llm::ChatModel;
use crate::models::{Route, RouteDecision};

const ROUTER_SYSTEM_PROMPT: &str = "\
You are a routing classifier for a multi-index question answering system.
Choices:
 - 'sql'  : if the question asks for metrics, numbers, counts, aggregates, tables, dates, filters.
 - 'code' : if the question is about functions, classes, errors, or implementation details in code.
 - 'pdf'  : if the question likely refers to a PDF document (formal reports, whitepapers, manuals).
 - 'doc'  : for general knowledge in text/markdown/html docs.
 - 'hybrid': if it clearly needs BOTH structured data (sql) and unstructured docs (doc/pdf/code).
Return JSON with keys: route, hybrid_order (list), reason.
Always respond with STRICT JSON only. No prose.";

pub struct Router {
    llm: Arc<dyn ChatModel>,
}

impl Router {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    /// Classify `question` into a validated [`RouteDecision`].
    ///
    /// Transport failures of the language model propagate as-is; an
    /// undecodable or invalid reply is returned as
    /// [`EngineError::RoutingDecode`].
    pub async fn decide(&self, question: &str) -> Result<RouteDecision> {
        let user = format!("Question: {question}\nRespond JSON now.");
        let raw = self.llm.complete(ROUTER_SYSTEM_PROMPT, &user, 0.0).await?;
        debug!(reply = %raw, "router classification reply");

        let mut decision: RouteDecision = parse_structured(&raw)?;
        validate(&mut decision)?;
        Ok(decision)
    }
}

/// Enforce the decision invariants: `hybrid_order` is required for the
/// hybrid route and dropped for any other route.
fn validate(decision: &mut RouteDecision) -> Result<(), EngineError> {
    if decision.route == Route::Hybrid {
        if decision.hybrid_order.is_empty() {
            return Err(EngineError::RoutingDecode(
                "hybrid route without a consultation order".to_string(),
            ));
        }
    } else {
        decision.hybrid_order.clear();
    }
    Ok(())
}

/// Parse a structured reply, falling back to the outermost brace-delimited
/// fragment when the model wrapped its JSON in prose or code fences.
fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, EngineError> {
    if let Ok(value) = serde_json::from_str::<T>(raw) {
        return Ok(value);
    }

    let fragment = extract_braced(raw).ok_or_else(|| {
        EngineError::RoutingDecode(format!("reply is not JSON: {}", preview(raw)))
    })?;

    serde_json::from_str::<T>(fragment)
        .map_err(|e| EngineError::RoutingDecode(format!("{e}: {}", preview(raw))))
}

fn extract_braced(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn preview(text: &str) -> String {
    text.chars().take(300).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HybridStep;
    use async_trait::async_trait;

    /// Chat model that replies with a fixed string.
    struct FixedReply(String);

    #[async_trait]
    impl ChatModel for FixedReply {
        async fn complete(&self, _system: &str, _user: &str, _temperature: f32) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn router(reply: &str) -> Router {
        Router::new(Arc::new(FixedReply(reply.to_string())))
    }

    #[tokio::test]
    async fn test_sql_reply_parses() {
        let r = router(r#"{"route":"sql","hybrid_order":[],"reason":"x"}"#);
        let decision = r.decide("how many users?").await.unwrap();
        assert_eq!(decision.route, Route::Sql);
        assert!(decision.hybrid_order.is_empty());
        assert_eq!(decision.reason, "x");
    }

    #[tokio::test]
    async fn test_unknown_route_is_decode_error() {
        let r = router(r#"{"route":"unknown","hybrid_order":[],"reason":"x"}"#);
        let err = r.decide("q").await.unwrap_err();
        let engine_err = err.downcast_ref::<EngineError>().unwrap();
        assert!(matches!(engine_err, EngineError::RoutingDecode(_)));
    }

    #[tokio::test]
    async fn test_non_json_is_decode_error() {
        let r = router("not json at all");
        let err = r.decide("q").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::RoutingDecode(_))
        ));
    }

    #[tokio::test]
    async fn test_embedded_json_fragment_is_extracted() {
        let r = router(
            "Sure, here is the routing decision:\n```json\n{\"route\":\"code\",\"hybrid_order\":[],\"reason\":\"implementation question\"}\n```",
        );
        let decision = r.decide("where is fn main?").await.unwrap();
        assert_eq!(decision.route, Route::Code);
    }

    #[tokio::test]
    async fn test_hybrid_requires_order() {
        let r = router(r#"{"route":"hybrid","hybrid_order":[],"reason":"needs both"}"#);
        let err = r.decide("q").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::RoutingDecode(_))
        ));
    }

    #[tokio::test]
    async fn test_hybrid_order_parses() {
        let r = router(r#"{"route":"hybrid","hybrid_order":["sql","doc"],"reason":"both"}"#);
        let decision = r.decide("q").await.unwrap();
        assert_eq!(decision.route, Route::Hybrid);
        assert_eq!(
            decision.hybrid_order,
            vec![HybridStep::Sql, HybridStep::Doc]
        );
    }

    #[tokio::test]
    async fn test_stray_order_on_plain_route_is_dropped() {
        let r = router(r#"{"route":"doc","hybrid_order":["sql"],"reason":"docs"}"#);
        let decision = r.decide("q").await.unwrap();
        assert_eq!(decision.route, Route::Doc);
        assert!(decision.hybrid_order.is_empty());
    }

    #[tokio::test]
    async fn test_missing_reason_defaults_empty() {
        let r = router(r#"{"route":"pdf"}"#);
        let decision = r.decide("q").await.unwrap();
        assert_eq!(decision.route, Route::Pdf);
        assert_eq!(decision.reason, "");
    }
}
