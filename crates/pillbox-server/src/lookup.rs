//! Lookup requests and responses

use pillbox_multiplexer::IndexedValue;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Inclusive step bounds; a missing bound is open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl StepRange {
    pub fn new(start: Option<i64>, end: Option<i64>) -> Self {
        Self { start, end }
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start > end => Err(QueryError::InvalidRange { start, end }),
            _ => Ok(()),
        }
    }

    pub fn contains(&self, step: i64) -> bool {
        self.start.is_none_or(|start| step >= start) && self.end.is_none_or(|end| step <= end)
    }
}

/// A request for the values of one tag in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRequest {
    pub run: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_range: Option<StepRange>,
}

impl LookupRequest {
    pub fn new(run: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            run: run.into(),
            tag: tag.into(),
            step_range: None,
        }
    }

    /// Restrict the lookup to `start <= step <= end`
    pub fn with_step_range(mut self, start: Option<i64>, end: Option<i64>) -> Self {
        self.step_range = Some(StepRange::new(start, end));
        self
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        match &self.step_range {
            Some(range) => range.validate(),
            None => Ok(()),
        }
    }
}

/// Ordered values for a [`LookupRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub run: String,
    pub tag: String,
    pub values: Vec<IndexedValue>,
    /// False when the run has not been indexed yet, or a refresh missed its deadline
    pub ready: bool,
}

impl LookupResponse {
    /// Empty response for a run that has nothing indexed yet
    pub fn not_ready(request: &LookupRequest) -> Self {
        Self {
            run: request.run.clone(),
            tag: request.tag.clone(),
            values: Vec::new(),
            ready: false,
        }
    }

    pub fn to_json(&self) -> Result<String, QueryError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn steps(&self) -> Vec<i64> {
        self.values.iter().map(|v| v.step).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_range_bounds() {
        let range = StepRange::new(Some(2), Some(7));
        assert!(range.contains(2));
        assert!(range.contains(7));
        assert!(!range.contains(8));
        assert!(StepRange::default().contains(i64::MIN));
        assert!(StepRange::new(None, Some(0)).contains(-5));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let request = LookupRequest::new(".", "layers/Matmul").with_step_range(Some(8), Some(2));
        assert!(matches!(
            request.validate(),
            Err(QueryError::InvalidRange { start: 8, end: 2 })
        ));
        assert!(LookupRequest::new(".", "a").validate().is_ok());
    }

    #[test]
    fn test_request_json_omits_missing_range() {
        let request = LookupRequest::new("run_foo", "layers/Variable");
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"run":"run_foo","tag":"layers/Variable"}"#);

        let parsed: LookupRequest = serde_json::from_str(&json).unwrap();
        assert!(parsed.step_range.is_none());
    }

    #[test]
    fn test_not_ready_response() {
        let response = LookupResponse::not_ready(&LookupRequest::new(".", "x"));
        assert!(!response.ready);
        assert!(response.values.is_empty());

        let json: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert_eq!(json["ready"], false);
        assert_eq!(json["values"], serde_json::json!([]));
    }
}
