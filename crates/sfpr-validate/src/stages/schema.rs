use serde_json::{Map, Value};
use sfpr_types::SubmissionMetadata;

use crate::result::{IssueKind, ValidationIssue};
use crate::stage::{StageDecision, ValidationContext, ValidationStage};

const REQUIRED: [&str; 4] = ["name", "vendor", "model", "serial"];
const OPTIONAL: [&str; 3] = ["notes", "sha256", "submitted_by"];

/// Metadata schema stage.
///
/// Checks that the metadata is a JSON object, that every required field is
/// a non-empty string within length limits, and that optional fields are
/// strings or null. All schema problems are reported together.
pub struct SchemaStage;

impl ValidationStage for SchemaStage {
    fn name(&self) -> &str {
        "schema"
    }

    fn evaluate(&self, context: &mut ValidationContext<'_>) -> StageDecision {
        let Some(object) = context.raw_metadata.as_object() else {
            return StageDecision::fail(ValidationIssue::new(
                IssueKind::SchemaError,
                format!(
                    "metadata must be a JSON object, got {}",
                    type_name(context.raw_metadata)
                ),
            ));
        };

        let mut issues = Vec::new();
        for field in REQUIRED {
            let limit = if field == "name" {
                context.config.max_name_len
            } else {
                context.config.max_field_len
            };
            check_required(object, field, limit, &mut issues);
        }
        for field in OPTIONAL {
            if let Some(value) = object.get(field) {
                if !value.is_string() && !value.is_null() {
                    issues.push(ValidationIssue::for_field(
                        IssueKind::SchemaError,
                        field,
                        format!("field `{field}` must be a string, got {}", type_name(value)),
                    ));
                }
            }
        }

        let mut unknown: Vec<&String> = object
            .keys()
            .filter(|k| !REQUIRED.contains(&k.as_str()) && !OPTIONAL.contains(&k.as_str()))
            .collect();
        unknown.sort();
        for key in unknown {
            context.warn(ValidationIssue::for_field(
                IssueKind::UnknownField,
                key.as_str(),
                format!("unknown field `{key}` ignored"),
            ));
        }

        if !issues.is_empty() {
            return StageDecision::Fail { issues };
        }

        context.metadata = Some(SubmissionMetadata {
            name: required_str(object, "name"),
            vendor: required_str(object, "vendor"),
            model: required_str(object, "model"),
            serial: required_str(object, "serial"),
            notes: optional_str(object, "notes"),
            sha256: optional_str(object, "sha256"),
            submitted_by: optional_str(object, "submitted_by"),
        });
        StageDecision::Pass
    }
}

fn check_required(
    object: &Map<String, Value>,
    field: &str,
    max_len: usize,
    issues: &mut Vec<ValidationIssue>,
) {
    match object.get(field) {
        None | Some(Value::Null) => issues.push(ValidationIssue::for_field(
            IssueKind::SchemaError,
            field,
            format!("missing required field `{field}`"),
        )),
        Some(Value::String(s)) if s.trim().is_empty() => issues.push(ValidationIssue::for_field(
            IssueKind::SchemaError,
            field,
            format!("field `{field}` must not be empty"),
        )),
        Some(Value::String(s)) if s.trim().chars().count() > max_len => {
            issues.push(ValidationIssue::for_field(
                IssueKind::SchemaError,
                field,
                format!("field `{field}` exceeds {max_len} characters"),
            ))
        }
        Some(Value::String(_)) => {}
        Some(other) => issues.push(ValidationIssue::for_field(
            IssueKind::SchemaError,
            field,
            format!("field `{field}` must be a string, got {}", type_name(other)),
        )),
    }
}

fn required_str(object: &Map<String, Value>, field: &str) -> String {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn optional_str(object: &Map<String, Value>, field: &str) -> Option<String> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;
    use serde_json::json;

    fn run(metadata: Value) -> (StageDecision, Option<SubmissionMetadata>, usize) {
        let config = ValidatorConfig::default();
        let mut ctx = ValidationContext::new(&metadata, &[], &config);
        let decision = SchemaStage.evaluate(&mut ctx);
        (decision, ctx.metadata, ctx.warnings.len())
    }

    #[test]
    fn complete_metadata_passes() {
        let (decision, meta, _) = run(json!({
            "name": " DAC ", "vendor": "V", "model": "M", "serial": "S", "notes": null
        }));
        assert!(decision.is_pass());
        let meta = meta.unwrap();
        assert_eq!(meta.name, "DAC");
        assert_eq!(meta.notes, None);
    }

    #[test]
    fn every_missing_field_is_reported() {
        let (decision, meta, _) = run(json!({ "name": "only a name" }));
        let StageDecision::Fail { issues } = decision else {
            panic!("expected failure");
        };
        let fields: Vec<_> = issues.iter().filter_map(|i| i.field.clone()).collect();
        assert_eq!(fields, vec!["vendor", "model", "serial"]);
        assert!(meta.is_none());
    }

    #[test]
    fn wrong_primitive_types_are_reported() {
        let (decision, _, _) = run(json!({
            "name": "n", "vendor": 42, "model": ["m"], "serial": "s", "notes": true
        }));
        let StageDecision::Fail { issues } = decision else {
            panic!("expected failure");
        };
        assert_eq!(issues.len(), 3);
        assert!(issues[0].message.contains("got number"));
        assert!(issues[1].message.contains("got array"));
        assert!(issues[2].message.contains("got boolean"));
        assert!(issues.iter().all(|i| i.kind == IssueKind::SchemaError));
    }

    #[test]
    fn non_object_metadata_fails() {
        let (decision, _, _) = run(json!("vendor=V"));
        assert!(!decision.is_pass());
    }

    #[test]
    fn blank_required_field_fails() {
        let (decision, _, _) = run(json!({
            "name": "n", "vendor": "   ", "model": "m", "serial": "s"
        }));
        assert!(!decision.is_pass());
    }

    #[test]
    fn overlong_field_fails() {
        let (decision, _, _) = run(json!({
            "name": "n", "vendor": "v".repeat(101), "model": "m", "serial": "s"
        }));
        assert!(!decision.is_pass());
    }

    #[test]
    fn unknown_fields_warn_only() {
        let (decision, _, warnings) = run(json!({
            "name": "n", "vendor": "v", "model": "m", "serial": "s", "colour": "blue"
        }));
        assert!(decision.is_pass());
        assert_eq!(warnings, 1);
    }
}
