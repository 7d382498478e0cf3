//! Vote response parsing.
//!
//! Turns the free-form completion of a voter into a structured
//! [`VotePayload`]. Pure domain logic: no I/O, only text and JSON handling.
//!
//! The first JSON object found in the text is decoded, so answers wrapped
//! in prose or markdown code fences are accepted:
//!
//! ```
//! use moe_domain::voting::parsing::parse_vote_response;
//!
//! let text = r#"Sure! {"intent": "consultar_tiempo", "confidence": 0.9,
//!     "entities": {"ubicacion": "Madrid"}} Anything else?"#;
//! let payload = parse_vote_response(text).unwrap();
//! assert_eq!(payload.intent, "consultar_tiempo");
//! assert_eq!(payload.entities["ubicacion"], "Madrid");
//! ```

use super::vote::{Entities, Subtask, SubtaskPriority, Vote};
use serde_json::{Map, Value};
use thiserror::Error;

/// Confidence assumed when the voter omits it
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("no JSON object found in response")]
    NoJsonObject,

    #[error("missing or empty intent")]
    MissingIntent,

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Structured content of a voter's answer
#[derive(Debug, Clone, PartialEq)]
pub struct VotePayload {
    pub intent: String,
    pub confidence: f64,
    pub entities: Entities,
    pub subtasks: Vec<Subtask>,
    pub reasoning: String,
}

impl VotePayload {
    /// Build a [`Vote`] for the given participant
    pub fn into_vote(self, llm_id: impl Into<String>) -> Vote {
        Vote::new(llm_id, self.intent, self.confidence)
            .with_entities(self.entities)
            .with_subtasks(self.subtasks)
            .with_reasoning(self.reasoning)
    }
}

/// Parse a voter completion into a [`VotePayload`]
pub fn parse_vote_response(response: &str) -> Result<VotePayload, ParseError> {
    let object = first_json_object(response).ok_or(ParseError::NoJsonObject)?;

    let intent = match object.get("intent") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return Err(ParseError::MissingIntent),
    };

    Ok(VotePayload {
        intent,
        confidence: parse_confidence(object.get("confidence"))?,
        entities: parse_entities(object.get("entities"))?,
        subtasks: parse_subtasks(object.get("subtasks"))?,
        reasoning: object
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
    })
}

/// Decode the first JSON object in `text`, ignoring anything after it.
fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    for (start, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = stream.next() {
            return Some(map);
        }
    }
    None
}

fn parse_confidence(value: Option<&Value>) -> Result<f64, ParseError> {
    let confidence = match value {
        None | Some(Value::Null) => DEFAULT_CONFIDENCE,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(DEFAULT_CONFIDENCE),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| ParseError::InvalidField {
            field: "confidence",
            reason: format!("not a number: {}", s),
        })?,
        Some(other) => {
            return Err(ParseError::InvalidField {
                field: "confidence",
                reason: format!("expected number, got {}", other),
            });
        }
    };

    if !confidence.is_finite() {
        return Err(ParseError::InvalidField {
            field: "confidence",
            reason: "not finite".to_string(),
        });
    }
    Ok(confidence.clamp(0.0, 1.0))
}

fn parse_entities(value: Option<&Value>) -> Result<Entities, ParseError> {
    let map = match value {
        None | Some(Value::Null) => return Ok(Entities::new()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(ParseError::InvalidField {
                field: "entities",
                reason: format!("expected object, got {}", other),
            });
        }
    };

    Ok(map
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), text))
        })
        .collect())
}

fn parse_subtasks(value: Option<&Value>) -> Result<Vec<Subtask>, ParseError> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ParseError::InvalidField {
                field: "subtasks",
                reason: format!("expected array, got {}", other),
            });
        }
    };

    Ok(items.iter().filter_map(parse_subtask).collect())
}

fn parse_subtask(item: &Value) -> Option<Subtask> {
    match item {
        Value::String(action) if !action.trim().is_empty() => {
            Some(Subtask::new(action.trim(), SubtaskPriority::default()))
        }
        Value::Object(map) => {
            let action = map.get("action").and_then(Value::as_str)?.trim();
            if action.is_empty() {
                return None;
            }
            let priority = match map.get("priority") {
                Some(Value::String(s)) => s.parse::<SubtaskPriority>().unwrap_or_default(),
                Some(Value::Number(n)) => n
                    .as_i64()
                    .and_then(SubtaskPriority::from_rank)
                    .unwrap_or_default(),
                _ => SubtaskPriority::default(),
            };
            Some(Subtask::new(action, priority))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_response() {
        let response = r#"{
            "intent": "encender_luz",
            "confidence": 0.85,
            "entities": {"lugar": "salon", "intensidad": 70, "confirmado": true, "color": null},
            "subtasks": [
                {"action": "verificar_dispositivo", "priority": "high"},
                {"action": "encender_luz", "priority": 2},
                {"priority": "low"},
                "confirmar_usuario"
            ],
            "reasoning": "The user asks to turn on the living room light"
        }"#;

        let payload = parse_vote_response(response).unwrap();
        assert_eq!(payload.intent, "encender_luz");
        assert!((payload.confidence - 0.85).abs() < 1e-9);
        assert_eq!(payload.entities["lugar"], "salon");
        assert_eq!(payload.entities["intensidad"], "70");
        assert_eq!(payload.entities["confirmado"], "true");
        assert!(!payload.entities.contains_key("color"));
        assert_eq!(payload.subtasks.len(), 3);
        assert_eq!(payload.subtasks[0].priority, SubtaskPriority::High);
        assert_eq!(payload.subtasks[1].priority, SubtaskPriority::Medium);
        assert_eq!(payload.subtasks[2].action, "confirmar_usuario");
        assert!(payload.reasoning.starts_with("The user"));
    }

    #[test]
    fn test_parse_with_prose_and_fences() {
        let response = "Here is my classification:\n```json\n{\"intent\": \"ayuda\", \"confidence\": 0.7}\n```\nLet me know {if} needed.";
        let payload = parse_vote_response(response).unwrap();
        assert_eq!(payload.intent, "ayuda");
        assert!(payload.entities.is_empty());
        assert!(payload.subtasks.is_empty());
    }

    #[test]
    fn test_skips_non_json_braces() {
        let response = "Template {user_message} ignored. {\"intent\": \"saludo\"}";
        assert_eq!(parse_vote_response(response).unwrap().intent, "saludo");
    }

    #[test]
    fn test_missing_confidence_defaults() {
        let payload = parse_vote_response(r#"{"intent": "ayuda"}"#).unwrap();
        assert_eq!(payload.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_confidence_clamped_and_string_accepted() {
        let payload = parse_vote_response(r#"{"intent": "ayuda", "confidence": 1.4}"#).unwrap();
        assert_eq!(payload.confidence, 1.0);
        let payload = parse_vote_response(r#"{"intent": "ayuda", "confidence": "0.3"}"#).unwrap();
        assert!((payload.confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_responses() {
        assert_eq!(parse_vote_response("no json here"), Err(ParseError::NoJsonObject));
        assert_eq!(parse_vote_response(""), Err(ParseError::NoJsonObject));
        assert_eq!(
            parse_vote_response(r#"{"intent": "  ", "confidence": 0.9}"#),
            Err(ParseError::MissingIntent)
        );
        assert_eq!(
            parse_vote_response(r#"{"intent": 3}"#),
            Err(ParseError::MissingIntent)
        );
        assert!(matches!(
            parse_vote_response(r#"{"intent": "ayuda", "confidence": [1]}"#),
            Err(ParseError::InvalidField { field: "confidence", .. })
        ));
        assert!(matches!(
            parse_vote_response(r#"{"intent": "ayuda", "entities": ["x"]}"#),
            Err(ParseError::InvalidField { field: "entities", .. })
        ));
        assert!(matches!(
            parse_vote_response(r#"{"intent": "ayuda", "subtasks": "x"}"#),
            Err(ParseError::InvalidField { field: "subtasks", .. })
        ));
    }

    #[test]
    fn test_into_vote() {
        let vote = parse_vote_response(r#"{"intent": "ayuda", "confidence": 0.6}"#)
            .unwrap()
            .into_vote("llm_a");
        assert_eq!(vote.llm_id, "llm_a");
        assert_eq!(vote.intent, "ayuda");
        assert!(vote.is_valid());
    }
}
