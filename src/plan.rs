//! Training plans as delivered by the gym API.
//!
//! Plans are read from JSON files, either bare or wrapped in the API's
//! `{status, data, message}` response envelope.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::PlanError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub name: String,
    #[serde(default)]
    pub sets: Option<u32>,
    /// Free-form, e.g. `"12"` or `"8-10"`
    #[serde(default, deserialize_with = "reps_as_string")]
    pub reps: Option<String>,
    #[serde(default)]
    pub rest_seconds: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Exercise {
    /// Short "3 x 12, 60s rest" style summary
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        match (self.sets, self.reps.as_deref()) {
            (Some(sets), Some(reps)) => parts.push(format!("{sets} x {reps}")),
            (Some(sets), None) => parts.push(format!("{sets} sets")),
            (None, Some(reps)) => parts.push(format!("{reps} reps")),
            (None, None) => {}
        }
        if let Some(rest) = self.rest_seconds {
            parts.push(format!("{rest}s rest"));
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Training {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl Training {
    /// Placeholder used when no plan file is given
    pub fn untitled(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: format!("Training {id}"),
            id,
            description: None,
            exercises: Vec::new(),
        }
    }
}

/// API response envelope
#[derive(Debug, Deserialize)]
struct Envelope {
    status: serde_json::Value,
    #[serde(default)]
    data: Option<Training>,
    #[serde(default)]
    message: Option<String>,
}

impl Envelope {
    fn is_success(&self) -> bool {
        match &self.status {
            serde_json::Value::Number(n) => n.as_u64().is_some_and(|code| (200..300).contains(&code)),
            serde_json::Value::String(s) => matches!(s.as_str(), "success" | "ok" | "OK"),
            serde_json::Value::Bool(b) => *b,
            _ => false,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanDocument {
    Enveloped(Envelope),
    Bare(Training),
}

/// Parse a plan from JSON text
pub fn parse_plan(raw: &str) -> Result<Training, PlanError> {
    match serde_json::from_str::<PlanDocument>(raw) {
        Ok(PlanDocument::Bare(training)) => Ok(training),
        Ok(PlanDocument::Enveloped(envelope)) => {
            if !envelope.is_success() {
                return Err(PlanError::Rejected {
                    status: envelope.status.to_string(),
                    message: envelope.message.unwrap_or_default(),
                });
            }
            envelope.data.ok_or_else(|| PlanError::Rejected {
                status: envelope.status.to_string(),
                message: envelope
                    .message
                    .unwrap_or_else(|| "response carried no training".to_string()),
            })
        }
        // untagged errors are opaque; re-parse as bare for a useful message
        Err(_) => Ok(serde_json::from_str::<Training>(raw)?),
    }
}

pub fn load_plan<P: AsRef<Path>>(path: P) -> Result<Training, PlanError> {
    let raw = fs::read_to_string(path)?;
    parse_plan(&raw)
}

fn id_as_string<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Num(u64),
        Str(String),
    }
    Ok(match Id::deserialize(d)? {
        Id::Num(n) => n.to_string(),
        Id::Str(s) => s,
    })
}

fn reps_as_string<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Reps {
        Num(u64),
        Str(String),
    }
    Ok(Option::<Reps>::deserialize(d)?.map(|r| match r {
        Reps::Num(n) => n.to_string(),
        Reps::Str(s) => s,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const BARE: &str = r#"{
        "id": 12,
        "name": "Upper body",
        "exercises": [
            { "name": "Bench press", "sets": 4, "reps": 8, "restSeconds": 90 },
            { "name": "Pull ups", "reps": "max" },
            { "name": "Plank", "notes": "keep hips level" }
        ]
    }"#;

    #[test]
    fn parses_bare_training() {
        let t = parse_plan(BARE).unwrap();
        assert_eq!(t.id, "12");
        assert_eq!(t.name, "Upper body");
        assert_eq!(t.exercises.len(), 3);
        assert_eq!(t.exercises[0].reps.as_deref(), Some("8"));
        assert_eq!(t.exercises[1].reps.as_deref(), Some("max"));
        assert_eq!(t.exercises[2].notes.as_deref(), Some("keep hips level"));
    }

    #[test]
    fn parses_success_envelope() {
        let raw = format!(r#"{{ "status": 200, "data": {BARE}, "message": "ok" }}"#);
        let t = parse_plan(&raw).unwrap();
        assert_eq!(t.name, "Upper body");

        let raw = format!(r#"{{ "status": "success", "data": {BARE} }}"#);
        assert!(parse_plan(&raw).is_ok());
    }

    #[test]
    fn rejects_error_envelope_with_message() {
        let raw = r#"{ "status": 404, "data": null, "message": "Training not found" }"#;
        assert_matches!(
            parse_plan(raw),
            Err(PlanError::Rejected { ref message, .. }) if message == "Training not found"
        );
    }

    #[test]
    fn rejects_success_envelope_without_data() {
        let raw = r#"{ "status": 200, "message": "empty" }"#;
        assert_matches!(parse_plan(raw), Err(PlanError::Rejected { .. }));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert_matches!(parse_plan("{ \"name\": 3 }"), Err(PlanError::Parse(_)));
    }

    #[test]
    fn exercise_summary_formats() {
        let t = parse_plan(BARE).unwrap();
        assert_eq!(t.exercises[0].summary(), "4 x 8, 90s rest");
        assert_eq!(t.exercises[1].summary(), "max reps");
        assert_eq!(t.exercises[2].summary(), "");
    }

    #[test]
    fn load_plan_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, BARE).unwrap();
        assert_eq!(load_plan(&path).unwrap().id, "12");
        assert_matches!(
            load_plan(dir.path().join("missing.json")),
            Err(PlanError::Io(_))
        );
    }

    #[test]
    fn untitled_plan_has_no_exercises() {
        let t = Training::untitled("7");
        assert_eq!(t.name, "Training 7");
        assert!(t.exercises.is_empty());
    }
}
