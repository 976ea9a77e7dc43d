//! Structured results of repository writes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reason a hook vetoed a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode {
    code: i32,
    message: String,
}

impl ErrorCode {
    /// Code reported by successful outcomes. Reserved: never a veto code.
    pub const SUCCEED: i32 = 0;

    /// Code a veto carries when it was given [`Self::SUCCEED`].
    pub const INTERNAL_ERROR: i32 = -50;

    /// Veto with `code` and `message`. [`Self::SUCCEED`] is reserved and is
    /// replaced by [`Self::INTERNAL_ERROR`].
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Self::veto_code(code),
            message: message.into(),
        }
    }

    const fn veto_code(code: i32) -> i32 {
        if code == Self::SUCCEED { Self::INTERNAL_ERROR } else { code }
    }

    /// Numeric code.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Human readable reason.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Success or failure of a write plus free-form attributes such as the
/// generated key (`id`) or the affected row count (`effectCount`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    attrs: Map<String, Value>,
}

impl Outcome {
    /// Successful outcome with no attributes.
    #[must_use]
    pub fn succeed() -> Self {
        Self {
            code: ErrorCode::SUCCEED,
            message: None,
            attrs: Map::new(),
        }
    }

    /// Failed outcome carrying `error`. Never reports success.
    #[must_use]
    pub fn failure(error: ErrorCode) -> Self {
        Self {
            code: ErrorCode::veto_code(error.code),
            message: Some(error.message),
            attrs: Map::new(),
        }
    }

    /// Attaches an attribute.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Whether the write went ahead.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code == ErrorCode::SUCCEED
    }

    /// Outcome code.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Failure message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// All attributes.
    #[must_use]
    pub const fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    /// Attribute `name`, if set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// The `effectCount` attribute, 0 when absent.
    #[must_use]
    pub fn effect_count(&self) -> u64 {
        self.get("effectCount").and_then(Value::as_u64).unwrap_or_default()
    }
}

impl From<ErrorCode> for Outcome {
    fn from(error: ErrorCode) -> Self {
        Self::failure(error)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_compactly() {
        let outcome = Outcome::succeed().attr("id", 7);
        assert_eq!(serde_json::to_value(&outcome).unwrap(), json!({"code": 0, "attrs": {"id": 7}}));

        let vetoed = Outcome::failure(ErrorCode::new(-3, "duplicate user"));
        assert!(!vetoed.is_success());
        assert_eq!(vetoed.message(), Some("duplicate user"));
        assert_eq!(vetoed.effect_count(), 0);
    }

    #[test]
    fn success_code_cannot_veto() {
        let code = ErrorCode::new(ErrorCode::SUCCEED, "refused");
        assert_eq!(code.code(), ErrorCode::INTERNAL_ERROR);

        let decoded: ErrorCode =
            serde_json::from_value(json!({"code": 0, "message": "refused"})).unwrap();
        let outcome = Outcome::failure(decoded);
        assert!(!outcome.is_success());
        assert_eq!(outcome.code(), ErrorCode::INTERNAL_ERROR);
        assert_eq!(outcome.message(), Some("refused"));
    }
}
