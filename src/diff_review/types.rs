use serde::{Deserialize, Serialize};

use crate::capture::types::Interaction;

/// One proposed change to the API specification, opaque to this crate.
///
/// The engine produces and consumes these; the review layer only carries
/// them through an approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecCommand {
    pub kind: String,
    pub payload: serde_json::Value,
}

/// Where an interpretation's change lands, derived from its context flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayContext {
    Request,
    Response,
}

/// Context flags attached to an interpretation by the engine.
///
/// `in_request_body` ties it to the observed request; a present
/// `response_id` ties it to the observed response. With neither matching the
/// display context at hand, the interpretation is suppressed rather than
/// shown ambiguously.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterpretationContext {
    #[serde(default)]
    pub in_request_body: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

impl InterpretationContext {
    pub fn applies_to(&self, display: DisplayContext) -> bool {
        match display {
            DisplayContext::Request => self.in_request_body,
            DisplayContext::Response => self.response_id.is_some(),
        }
    }
}

/// A proposed spec change reconciling one interaction with the known spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interpretation {
    /// Human-readable summary of the proposed action.
    pub action_title: String,
    /// Commands to submit to the engine when the reviewer approves.
    pub commands: Vec<SpecCommand>,
    /// Identifiers this change would add to the spec.
    #[serde(default)]
    pub added_ids: Vec<String>,
    /// Identifiers this change would modify.
    #[serde(default)]
    pub changed_ids: Vec<String>,
    #[serde(default)]
    pub context: InterpretationContext,
}

/// Pairing of one observed interaction with the engine's interpretation of
/// it, the unit of human review. Without an interpretation the record is
/// unexplained traffic; with one it is actionable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffRecord {
    pub interaction: Interaction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<Interpretation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_context_applies_to_request_only() {
        let context = InterpretationContext {
            in_request_body: true,
            response_id: None,
        };
        assert!(context.applies_to(DisplayContext::Request));
        assert!(!context.applies_to(DisplayContext::Response));
    }

    #[test]
    fn response_id_context_applies_to_response_only() {
        let context = InterpretationContext {
            in_request_body: false,
            response_id: Some("response_200".to_string()),
        };
        assert!(!context.applies_to(DisplayContext::Request));
        assert!(context.applies_to(DisplayContext::Response));
    }

    #[test]
    fn neither_flag_suppresses_both_contexts() {
        let context = InterpretationContext::default();
        assert!(!context.applies_to(DisplayContext::Request));
        assert!(!context.applies_to(DisplayContext::Response));
    }
}
