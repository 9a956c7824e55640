//! Structured projection of an analysis payload.
//!
//! The payload returned by the remote worker is opaque. For the subject's
//! durable analysis record it is flattened into named numeric metrics and
//! textual notes; nested objects use dotted keys (`voice.pitch_hz`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AnalysisPayload, JobId};

/// Flattened analysis record for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisBreakdown {
    pub subject_id: String,
    pub job_id: JobId,
    pub metrics: BTreeMap<String, f64>,
    pub notes: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

impl AnalysisBreakdown {
    pub fn from_payload(subject_id: impl Into<String>, job_id: JobId, payload: &AnalysisPayload) -> Self {
        let mut metrics = BTreeMap::new();
        let mut notes = BTreeMap::new();

        for (key, value) in payload {
            flatten(key, value, &mut metrics, &mut notes);
        }

        Self {
            subject_id: subject_id.into(),
            job_id,
            metrics,
            notes,
            recorded_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.notes.is_empty()
    }
}

fn flatten(
    key: &str,
    value: &Value,
    metrics: &mut BTreeMap<String, f64>,
    notes: &mut BTreeMap<String, String>,
) {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                metrics.insert(key.to_string(), f);
            }
        }
        Value::String(s) => {
            notes.insert(key.to_string(), s.clone());
        }
        Value::Bool(b) => {
            notes.insert(key.to_string(), b.to_string());
        }
        Value::Object(map) => {
            for (child, v) in map {
                flatten(&format!("{}.{}", key, child), v, metrics, notes);
            }
        }
        // Arrays carry per-segment series the record doesn't keep.
        Value::Array(_) | Value::Null => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flattens_nested_payload() {
        let payload = json!({
            "intensity_db": 65.5,
            "words_per_minute": 142,
            "summary": "steady pace",
            "voice": { "pitch_hz": 180.25, "monotone": false },
            "segments": [1, 2, 3],
            "missing": null
        });
        let payload = payload.as_object().unwrap();

        let breakdown = AnalysisBreakdown::from_payload("subject-1", JobId::from_string("job-1"), payload);

        assert_eq!(breakdown.metrics.get("intensity_db"), Some(&65.5));
        assert_eq!(breakdown.metrics.get("words_per_minute"), Some(&142.0));
        assert_eq!(breakdown.metrics.get("voice.pitch_hz"), Some(&180.25));
        assert_eq!(breakdown.notes.get("summary").map(String::as_str), Some("steady pace"));
        assert_eq!(breakdown.notes.get("voice.monotone").map(String::as_str), Some("false"));
        assert!(!breakdown.metrics.contains_key("segments"));
        assert!(!breakdown.notes.contains_key("missing"));
    }

    #[test]
    fn test_empty_payload() {
        let breakdown = AnalysisBreakdown::from_payload("s", JobId::new(), &AnalysisPayload::new());
        assert!(breakdown.is_empty());
    }
}
