//! Review actions and the JSON request/response shapes that carry them.
use super::SchedulingSnapshot;
use super::sm2::Quality;
use crate::error::{FlashcardError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewAction {
    Known,
    Unknown,
    /// Postpone by a positive number of days without touching SM-2 state.
    Snooze(u32),
}

impl ReviewAction {
    /// Parses an action token; `snooze_days` is only read for `snooze`.
    pub fn parse(action: &str, snooze_days: Option<&Value>) -> Result<Self> {
        match action.trim().to_lowercase().as_str() {
            "known" => Ok(ReviewAction::Known),
            "unknown" => Ok(ReviewAction::Unknown),
            "snooze" => {
                let days = snooze_days
                    .and_then(integer_like)
                    .ok_or_else(|| {
                        FlashcardError::InvalidParameter("invalid snooze_days".to_string())
                    })?;
                Self::snooze(days)
            }
            other => Err(FlashcardError::InvalidAction(other.to_string())),
        }
    }

    fn snooze(days: i64) -> Result<Self> {
        if days <= 0 {
            return Err(FlashcardError::InvalidParameter(
                "snooze_days must be > 0".to_string(),
            ));
        }
        let days = u32::try_from(days).map_err(|_| {
            FlashcardError::InvalidParameter(format!("snooze_days too large: {}", days))
        })?;
        Ok(ReviewAction::Snooze(days))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReviewAction::Known => "known",
            ReviewAction::Unknown => "unknown",
            ReviewAction::Snooze(_) => "snooze",
        }
    }

    /// Quality fed to SM-2 for graded actions; `None` for snooze.
    pub fn quality(&self) -> Option<Quality> {
        match self {
            ReviewAction::Known => Some(Quality::PERFECT),
            ReviewAction::Unknown => Some(Quality::FAILED),
            ReviewAction::Snooze(_) => None,
        }
    }
}

/// Inbound review payload: `{ "card_id": .., "action": .., "snooze_days": .. }`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub card_id: Value,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub snooze_days: Option<Value>,
}

impl ReviewRequest {
    /// Builds a request from already-typed fields, validated like a JSON one.
    pub fn new(card_id: i64, action: &str, snooze_days: Option<i64>) -> Self {
        Self {
            card_id: Value::from(card_id),
            action: Some(action.to_string()),
            snooze_days: snooze_days.map(Value::from),
        }
    }

    pub fn card_id(&self) -> Result<i64> {
        integer_like(&self.card_id)
            .ok_or_else(|| FlashcardError::InvalidParameter("invalid card_id".to_string()))
    }

    pub fn parse_action(&self) -> Result<ReviewAction> {
        ReviewAction::parse(
            self.action.as_deref().unwrap_or(""),
            self.snooze_days.as_ref(),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub status: String,
    pub action: String,
    pub card_id: i64,
    pub next_review: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_meta: Option<SchedulingSnapshot>,
}

impl ReviewResponse {
    pub fn ok(
        action: ReviewAction,
        card_id: i64,
        next_review: Option<DateTime<Utc>>,
        new_meta: Option<SchedulingSnapshot>,
    ) -> Self {
        Self {
            status: "ok".to_string(),
            action: action.name().to_string(),
            card_id,
            next_review: next_review.map(format_timestamp),
            new_meta,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&FlashcardError> for ErrorResponse {
    fn from(err: &FlashcardError) -> Self {
        if err.is_client_error() {
            Self {
                error: err.to_string(),
                detail: None,
            }
        } else {
            Self {
                error: "internal server error".to_string(),
                detail: Some(err.to_string()),
            }
        }
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts JSON integers, integral floats, and numeric strings.
pub(crate) fn integer_like(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_graded_actions_case_insensitive() {
        assert_eq!(ReviewAction::parse("Known", None).unwrap(), ReviewAction::Known);
        assert_eq!(
            ReviewAction::parse(" UNKNOWN ", None).unwrap(),
            ReviewAction::Unknown
        );
    }

    #[test]
    fn test_parse_snooze_days() {
        assert_eq!(
            ReviewAction::parse("snooze", Some(&json!(3))).unwrap(),
            ReviewAction::Snooze(3)
        );
        assert_eq!(
            ReviewAction::parse("snooze", Some(&json!("2"))).unwrap(),
            ReviewAction::Snooze(2)
        );
    }

    #[test]
    fn test_snooze_rejects_non_positive_or_missing() {
        for days in [json!(0), json!(-4), json!("abc"), json!(1.5), Value::Null] {
            let err = ReviewAction::parse("snooze", Some(&days)).unwrap_err();
            assert!(matches!(err, FlashcardError::InvalidParameter(_)), "{}", days);
        }
        assert!(matches!(
            ReviewAction::parse("snooze", None),
            Err(FlashcardError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_unknown_token_is_invalid_action() {
        assert!(matches!(
            ReviewAction::parse("skip", Some(&json!(0))),
            Err(FlashcardError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_action_quality_mapping() {
        assert_eq!(ReviewAction::Known.quality(), Some(Quality::PERFECT));
        assert_eq!(ReviewAction::Unknown.quality().map(|q| q.value()), Some(2));
        assert_eq!(ReviewAction::Snooze(1).quality(), None);
    }

    #[test]
    fn test_request_card_id_forms() {
        let req: ReviewRequest =
            serde_json::from_value(json!({"card_id": "17", "action": "known"})).unwrap();
        assert_eq!(req.card_id().unwrap(), 17);

        let req: ReviewRequest =
            serde_json::from_value(json!({"card_id": 4.0, "action": "known"})).unwrap();
        assert_eq!(req.card_id().unwrap(), 4);

        let req: ReviewRequest = serde_json::from_value(json!({"action": "known"})).unwrap();
        assert!(matches!(
            req.card_id(),
            Err(FlashcardError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_typed_request_validates_like_json() {
        let req = ReviewRequest::new(5, "snooze", Some(3));
        assert_eq!(req.card_id().unwrap(), 5);
        assert_eq!(req.parse_action().unwrap(), ReviewAction::Snooze(3));

        let req = ReviewRequest::new(5, "snooze", None);
        assert!(matches!(
            req.parse_action(),
            Err(FlashcardError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_snooze_response_omits_new_meta() {
        let resp = ReviewResponse::ok(ReviewAction::Snooze(2), 9, None, None);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            value,
            json!({"status": "ok", "action": "snooze", "card_id": 9, "next_review": null})
        );
    }

    #[test]
    fn test_error_response_hides_nothing_for_client_errors() {
        let resp = ErrorResponse::from(&FlashcardError::NotFound(3));
        assert_eq!(resp.error, "card not found: 3");
        assert_eq!(resp.detail, None);

        let resp = ErrorResponse::from(&FlashcardError::LedgerWrite("disk full".to_string()));
        assert_eq!(resp.error, "internal server error");
        assert!(resp.detail.unwrap().contains("disk full"));
    }
}
