use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{FieldError, PipelineError};

/// Validated caller input for one pipeline run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInput {
    pub keyword: String,
    pub jurisdiction: String,
    pub practice_area: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firm_id: Option<String>,
}

/// (field, min chars, max chars)
const BOUNDS: [(&str, usize, usize); 3] = [
    ("keyword", 1, 100),
    ("jurisdiction", 2, 50),
    ("practiceArea", 2, 50),
];

impl PipelineInput {
    pub fn new(
        keyword: impl Into<String>,
        jurisdiction: impl Into<String>,
        practice_area: impl Into<String>,
    ) -> Self {
        Self {
            keyword: keyword.into(),
            jurisdiction: jurisdiction.into(),
            practice_area: practice_area.into(),
            firm_id: None,
        }
    }

    pub fn with_firm_id(mut self, firm_id: impl Into<String>) -> Self {
        self.firm_id = Some(firm_id.into());
        self
    }

    /// Validate a raw JSON request body, collecting every failed rule.
    pub fn from_json(body: &Value) -> Result<Self, PipelineError> {
        let Some(obj) = body.as_object() else {
            return Err(PipelineError::InvalidInput(vec![FieldError::new(
                "",
                "Expected object",
            )]));
        };

        let mut errors = Vec::new();
        let mut values: [String; 3] = Default::default();

        for (slot, (field, min, max)) in values.iter_mut().zip(BOUNDS) {
            match obj.get(field) {
                None | Some(Value::Null) => errors.push(FieldError::new(field, "Required")),
                Some(Value::String(s)) => {
                    if let Some(msg) = length_error(s, min, max) {
                        errors.push(FieldError::new(field, msg));
                    } else {
                        *slot = s.clone();
                    }
                }
                Some(_) => errors.push(FieldError::new(field, "Expected string")),
            }
        }

        let firm_id = match obj.get("firmId") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                errors.push(FieldError::new("firmId", "Expected string"));
                None
            }
        };

        if !errors.is_empty() {
            return Err(PipelineError::InvalidInput(errors));
        }

        let [keyword, jurisdiction, practice_area] = values;
        Ok(Self {
            keyword,
            jurisdiction,
            practice_area,
            firm_id,
        })
    }

    /// Validate an already-typed input (CLI path).
    pub fn validate(&self) -> Result<(), PipelineError> {
        let body = serde_json::to_value(self)
            .map_err(|e| PipelineError::Internal(format!("failed to serialize input: {e}")))?;
        Self::from_json(&body).map(|_| ())
    }
}

fn length_error(s: &str, min: usize, max: usize) -> Option<String> {
    let len = s.chars().count();
    if len < min {
        Some(format!("String must contain at least {min} character(s)"))
    } else if len > max {
        Some(format!("String must contain at most {max} character(s)"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_errors(result: Result<PipelineInput, PipelineError>) -> Vec<FieldError> {
        match result {
            Err(PipelineError::InvalidInput(fields)) => fields,
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn accepts_valid_body() {
        let input = PipelineInput::from_json(&json!({
            "keyword": "car accident lawyer houston",
            "jurisdiction": "Texas",
            "practiceArea": "Personal Injury"
        }))
        .unwrap();
        assert_eq!(input.keyword, "car accident lawyer houston");
        assert_eq!(input.practice_area, "Personal Injury");
        assert!(input.firm_id.is_none());
    }

    #[test]
    fn keeps_firm_id() {
        let input = PipelineInput::from_json(&json!({
            "keyword": "dui attorney",
            "jurisdiction": "CA",
            "practiceArea": "DUI/DWI",
            "firmId": "firm-7"
        }))
        .unwrap();
        assert_eq!(input.firm_id.as_deref(), Some("firm-7"));
    }

    #[test]
    fn reports_every_failed_field() {
        let fields = field_errors(PipelineInput::from_json(&json!({
            "keyword": "",
            "jurisdiction": "T",
            "firmId": 12
        })));
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["keyword", "jurisdiction", "practiceArea", "firmId"]);
        assert_eq!(fields[2].message, "Required");
        assert!(fields[0].message.contains("at least 1"));
    }

    #[test]
    fn enforces_upper_bounds() {
        let fields = field_errors(PipelineInput::from_json(&json!({
            "keyword": "k".repeat(101),
            "jurisdiction": "j".repeat(51),
            "practiceArea": "Family Law"
        })));
        assert_eq!(fields.len(), 2);
        assert!(fields[0].message.contains("at most 100"));
        assert!(fields[1].message.contains("at most 50"));
    }

    #[test]
    fn counts_characters_not_bytes() {
        let input = PipelineInput::from_json(&json!({
            "keyword": "é".repeat(100),
            "jurisdiction": "Québec",
            "practiceArea": "Immigration"
        }));
        assert!(input.is_ok());
    }

    #[test]
    fn rejects_non_object_body() {
        let fields = field_errors(PipelineInput::from_json(&json!(["keyword"])));
        assert_eq!(fields[0].message, "Expected object");
    }

    #[test]
    fn rejects_wrong_types() {
        let fields = field_errors(PipelineInput::from_json(&json!({
            "keyword": 5,
            "jurisdiction": "Texas",
            "practiceArea": "Bankruptcy"
        })));
        assert_eq!(fields, vec![FieldError::new("keyword", "Expected string")]);
    }

    #[test]
    fn typed_validate_matches_json_rules() {
        assert!(PipelineInput::new("kw", "NY", "Divorce").validate().is_ok());
        assert!(PipelineInput::new("kw", "N", "Divorce").validate().is_err());
    }
}
