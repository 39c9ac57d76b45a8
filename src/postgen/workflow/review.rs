// SPDX-License-Identifier: MIT

//! Human review - resume payload validation and the post-review branch

use crate::adk::error::PostgenError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::state::GenerationState;

/// A reviewer's decision on the current draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewInput {
    pub human_approved: bool,
    #[serde(default)]
    pub human_feedback: Option<String>,
}

impl ReviewInput {
    pub fn approve() -> Self {
        Self {
            human_approved: true,
            human_feedback: None,
        }
    }

    pub fn reject(feedback: impl Into<String>) -> Self {
        Self {
            human_approved: false,
            human_feedback: Some(feedback.into()),
        }
    }

    /// Validate a raw resume payload
    ///
    /// `human_approved` must be a boolean, `human_feedback` a string, null or
    /// absent, and nothing else may be present.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, PostgenError> {
        if let Some(unknown) = fields
            .keys()
            .find(|k| !matches!(k.as_str(), "human_approved" | "human_feedback"))
        {
            return Err(PostgenError::InvalidReview(format!(
                "unexpected field '{}'",
                unknown
            )));
        }

        let human_approved = match fields.get("human_approved") {
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(PostgenError::InvalidReview(format!(
                    "human_approved must be a boolean, got {}",
                    other
                )))
            }
            None => {
                return Err(PostgenError::InvalidReview(
                    "human_approved is required".to_string(),
                ))
            }
        };

        let human_feedback = match fields.get("human_feedback") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(PostgenError::InvalidReview(format!(
                    "human_feedback must be a string or null, got {}",
                    other
                )))
            }
        };

        Ok(Self {
            human_approved,
            human_feedback,
        })
    }
}

/// Branch label after the review point: `approved` or `rejected`
pub fn review_branch(state: &GenerationState) -> String {
    match &state.review {
        Some(review) if !review.human_approved => "rejected",
        _ => "approved",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_valid_payloads() {
        let review = ReviewInput::from_fields(&fields(json!({ "human_approved": true }))).unwrap();
        assert_eq!(review, ReviewInput::approve());

        let review = ReviewInput::from_fields(&fields(json!({
            "human_approved": false,
            "human_feedback": "Make it shorter"
        })))
        .unwrap();
        assert_eq!(review, ReviewInput::reject("Make it shorter"));

        let review = ReviewInput::from_fields(&fields(json!({
            "human_approved": true,
            "human_feedback": null
        })))
        .unwrap();
        assert_eq!(review.human_feedback, None);
    }

    #[test]
    fn test_missing_approval_rejected() {
        let err = ReviewInput::from_fields(&fields(json!({ "human_feedback": "ok" }))).unwrap_err();
        assert!(matches!(err, PostgenError::InvalidReview(msg) if msg.contains("required")));
    }

    #[test]
    fn test_wrong_types_rejected() {
        assert!(ReviewInput::from_fields(&fields(json!({ "human_approved": "yes" }))).is_err());
        assert!(ReviewInput::from_fields(&fields(json!({
            "human_approved": true,
            "human_feedback": 3
        })))
        .is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ReviewInput::from_fields(&fields(json!({
            "human_approved": true,
            "edited_draft": "new text"
        })))
        .unwrap_err();
        assert!(err.to_string().contains("edited_draft"));
    }
}
