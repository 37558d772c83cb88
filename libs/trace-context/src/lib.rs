//! Correlation-id and B3 trace-context propagation
//!
//! Carries request identity across HTTP, broker, and workflow-engine
//! boundaries so logs and spans join up end to end:
//! - HTTP: `X-Correlation-ID` header plus B3 multi-headers
//! - Broker: message headers on every published event
//! - Logging: ids are recorded as span fields by the callers
//!
//! The trace context uses the B3 multi-header format: a 128-bit trace id, a
//! 64-bit span id, an optional parent span id, and a sampling flag.

use std::collections::BTreeMap;

use rand::Rng;
use uuid::Uuid;

/// HTTP/broker header for the correlation id
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// B3 multi-header names
pub const B3_TRACE_ID: &str = "x-b3-traceid";
pub const B3_SPAN_ID: &str = "x-b3-spanid";
pub const B3_PARENT_SPAN_ID: &str = "x-b3-parentspanid";
pub const B3_SAMPLED: &str = "x-b3-sampled";

/// Generate a fresh correlation id.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// A B3 trace context as carried between services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// 128-bit trace id, lower-hex encoded (32 chars)
    pub trace_id: String,
    /// 64-bit span id, lower-hex encoded (16 chars)
    pub span_id: String,
    /// Span id of the caller, if any
    pub parent_span_id: Option<String>,
    pub sampled: bool,
}

impl TraceContext {
    /// Start a new root trace.
    pub fn new_root() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            trace_id: format!("{:032x}", rng.gen::<u128>()),
            span_id: format!("{:016x}", rng.gen::<u64>()),
            parent_span_id: None,
            sampled: true,
        }
    }

    /// Derive a child context for an outgoing call: same trace, new span,
    /// current span becomes the parent.
    pub fn child(&self) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            trace_id: self.trace_id.clone(),
            span_id: format!("{:016x}", rng.gen::<u64>()),
            parent_span_id: Some(self.span_id.clone()),
            sampled: self.sampled,
        }
    }

    /// Write the B3 multi-headers into a generic carrier.
    pub fn inject(&self, carrier: &mut BTreeMap<String, String>) {
        carrier.insert(B3_TRACE_ID.to_string(), self.trace_id.clone());
        carrier.insert(B3_SPAN_ID.to_string(), self.span_id.clone());
        if let Some(parent) = &self.parent_span_id {
            carrier.insert(B3_PARENT_SPAN_ID.to_string(), parent.clone());
        }
        carrier.insert(
            B3_SAMPLED.to_string(),
            if self.sampled { "1" } else { "0" }.to_string(),
        );
    }

    /// Read a context back from a carrier. Returns None when the trace id or
    /// span id is missing.
    pub fn extract(mut lookup: impl FnMut(&str) -> Option<String>) -> Option<Self> {
        let trace_id = lookup(B3_TRACE_ID)?;
        let span_id = lookup(B3_SPAN_ID)?;
        Some(Self {
            trace_id,
            span_id,
            parent_span_id: lookup(B3_PARENT_SPAN_ID),
            sampled: lookup(B3_SAMPLED).map(|v| v == "1").unwrap_or(true),
        })
    }

    /// Context to propagate downstream: continue the incoming trace if there
    /// is one, otherwise start a new root.
    pub fn continue_or_root(incoming: Option<&TraceContext>) -> Self {
        match incoming {
            Some(ctx) => ctx.child(),
            None => Self::new_root(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inject_extract_round_trip() {
        let ctx = TraceContext::new_root();
        let mut carrier = BTreeMap::new();
        ctx.inject(&mut carrier);

        let extracted = TraceContext::extract(|k| carrier.get(k).cloned()).unwrap();
        assert_eq!(extracted, ctx);
    }

    #[test]
    fn child_keeps_trace_links_parent() {
        let root = TraceContext::new_root();
        let child = root.child();
        assert_eq!(child.trace_id, root.trace_id);
        assert_ne!(child.span_id, root.span_id);
        assert_eq!(child.parent_span_id.as_deref(), Some(root.span_id.as_str()));
    }

    #[test]
    fn extract_requires_trace_and_span() {
        let mut carrier = BTreeMap::new();
        carrier.insert(B3_TRACE_ID.to_string(), "abc".to_string());
        assert!(TraceContext::extract(|k| carrier.get(k).cloned()).is_none());
    }

    #[test]
    fn id_widths_follow_b3() {
        let ctx = TraceContext::new_root();
        assert_eq!(ctx.trace_id.len(), 32);
        assert_eq!(ctx.span_id.len(), 16);
    }
}
