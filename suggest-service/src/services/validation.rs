//! Structural validation of model output.
//!
//! The model is asked for a bare JSON array of suggestion objects. Anything
//! else is rejected: no coercion of field types, no partial results.

use crate::models::{SuggestionList, SuggestionRecord};
use serde_json::{Map, Value};
use thiserror::Error;
use validator::Validate;

const REQUIRED_FIELDS: [&str; 3] = ["name", "description", "image_url"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Model output is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("Model output is not a JSON array")]
    NotAnArray,

    #[error("Suggestion {index} is missing field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Suggestion {index} has a non-string '{field}'")]
    WrongType { index: usize, field: &'static str },

    #[error("Suggestion {index} has an invalid '{field}'")]
    InvalidField { index: usize, field: String },

    #[error("Model returned no suggestions")]
    EmptyResult,
}

impl ValidationError {
    /// Stable reason label.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::MalformedJson(_) => "malformed-json",
            ValidationError::NotAnArray | ValidationError::WrongType { .. } => "wrong-type",
            ValidationError::MissingField { .. } => "missing-field",
            ValidationError::InvalidField { .. } => "invalid-field",
            ValidationError::EmptyResult => "empty-result",
        }
    }
}

/// Parse raw model text into a non-empty list of suggestions.
pub fn validate(raw: &str) -> Result<SuggestionList, ValidationError> {
    let body = strip_code_fence(raw);

    let value: Value =
        serde_json::from_str(body).map_err(|e| ValidationError::MalformedJson(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        _ => return Err(ValidationError::NotAnArray),
    };

    if items.is_empty() {
        return Err(ValidationError::EmptyResult);
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| to_record(index, item))
        .collect()
}

fn to_record(index: usize, item: Value) -> Result<SuggestionRecord, ValidationError> {
    let mut object = match item {
        Value::Object(object) => object,
        _ => {
            return Err(ValidationError::WrongType {
                index,
                field: "<element>",
            })
        }
    };

    for field in REQUIRED_FIELDS {
        match object.get(field) {
            None => return Err(ValidationError::MissingField { index, field }),
            Some(Value::String(_)) => {}
            Some(_) => return Err(ValidationError::WrongType { index, field }),
        }
    }

    let record = SuggestionRecord {
        name: take_string(&mut object, "name"),
        description: take_string(&mut object, "description"),
        image_url: take_string(&mut object, "image_url"),
    };

    record.validate().map_err(|errors| {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|k| k.to_string())
            .collect();
        fields.sort();
        ValidationError::InvalidField {
            index,
            field: fields.join(","),
        }
    })?;

    Ok(record)
}

fn take_string(object: &mut Map<String, Value>, field: &str) -> String {
    match object.remove(field) {
        Some(Value::String(s)) => s,
        _ => String::new(),
    }
}

/// Drop a surrounding Markdown code fence (with or without a language tag).
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };

    // Skip the info string, e.g. "json", up to the first newline.
    match inner.find('\n') {
        Some(newline) => inner[newline + 1..].trim(),
        None => inner.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINKAKUJI: &str = r#"[{"name":"Kinkaku-ji","description":"Golden pavilion","image_url":"http://example.com/a.jpg"}]"#;

    fn five_records() -> SuggestionList {
        [
            ("Kinkaku-ji", "金色に輝く楼閣", "https://example.com/kinkakuji.jpg"),
            ("Fushimi Inari", "千本鳥居の神社", "https://example.com/inari.jpg"),
            ("Kiyomizu-dera", "清水の舞台", "https://example.com/kiyomizu.jpg"),
            ("Arashiyama", "竹林の小径", "https://example.com/arashiyama.jpg"),
            ("Gion", "花街の町並み", "https://example.com/gion.jpg"),
        ]
        .into_iter()
        .map(|(n, d, u)| SuggestionRecord::new(n, d, u))
        .collect()
    }

    #[test]
    fn single_record_is_preserved() {
        let list = validate(KINKAKUJI).unwrap();
        assert_eq!(
            list,
            vec![SuggestionRecord::new(
                "Kinkaku-ji",
                "Golden pavilion",
                "http://example.com/a.jpg"
            )]
        );
    }

    #[test]
    fn serialized_list_validates_to_itself() {
        let expected = five_records();
        let raw = serde_json::to_string(&expected).unwrap();
        assert_eq!(validate(&raw).unwrap(), expected);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let raw = r#"[{"name":"Gion","description":"d","image_url":"https://e.com/g.png","rating":5}]"#;
        assert_eq!(validate(raw).unwrap().len(), 1);
    }

    #[test]
    fn fenced_output_is_accepted() {
        let raw = format!("```json\n{}\n```", KINKAKUJI);
        assert_eq!(validate(&raw).unwrap().len(), 1);

        let raw = format!("  ```\n{}```  ", KINKAKUJI);
        assert_eq!(validate(&raw).unwrap().len(), 1);
    }

    #[test]
    fn non_json_is_malformed() {
        let err = validate("not json").unwrap_err();
        assert!(matches!(err, ValidationError::MalformedJson(_)));
        assert_eq!(err.reason(), "malformed-json");
    }

    #[test]
    fn truncated_json_is_malformed() {
        assert!(matches!(
            validate(&KINKAKUJI[..KINKAKUJI.len() - 3]),
            Err(ValidationError::MalformedJson(_))
        ));
    }

    #[test]
    fn object_at_top_level_is_rejected() {
        let err = validate(r#"{"suggestions":[]}"#).unwrap_err();
        assert_eq!(err, ValidationError::NotAnArray);
        assert_eq!(err.reason(), "wrong-type");
    }

    #[test]
    fn empty_array_is_empty_result() {
        assert_eq!(validate("[]"), Err(ValidationError::EmptyResult));
        assert_eq!(validate(" [ ] ").unwrap_err().reason(), "empty-result");
    }

    #[test]
    fn each_missing_field_is_reported() {
        for field in REQUIRED_FIELDS {
            let mut object = serde_json::json!({
                "name": "Gion",
                "description": "d",
                "image_url": "https://e.com/g.png"
            });
            object.as_object_mut().unwrap().remove(field);
            let raw = serde_json::json!([object]).to_string();

            let err = validate(&raw).unwrap_err();
            assert_eq!(err, ValidationError::MissingField { index: 0, field });
            assert_eq!(err.reason(), "missing-field");
        }
    }

    #[test]
    fn missing_field_reports_element_index() {
        let raw = r#"[
            {"name":"Gion","description":"d","image_url":"https://e.com/g.png"},
            {"name":"Gion","image_url":"https://e.com/g.png"}
        ]"#;
        assert_eq!(
            validate(raw),
            Err(ValidationError::MissingField {
                index: 1,
                field: "description"
            })
        );
    }

    #[test]
    fn numeric_name_is_not_coerced() {
        let raw = r#"[{"name":42,"description":"d","image_url":"https://e.com/g.png"}]"#;
        assert_eq!(
            validate(raw),
            Err(ValidationError::WrongType {
                index: 0,
                field: "name"
            })
        );
    }

    #[test]
    fn null_field_is_wrong_type() {
        let raw = r#"[{"name":"Gion","description":null,"image_url":"https://e.com/g.png"}]"#;
        assert_eq!(validate(raw).unwrap_err().reason(), "wrong-type");
    }

    #[test]
    fn non_object_element_is_wrong_type() {
        assert!(matches!(
            validate(r#"["Kinkaku-ji"]"#),
            Err(ValidationError::WrongType { index: 0, .. })
        ));
    }

    #[test]
    fn empty_name_is_invalid() {
        let raw = r#"[{"name":"","description":"d","image_url":"https://e.com/g.png"}]"#;
        assert_eq!(
            validate(raw),
            Err(ValidationError::InvalidField {
                index: 0,
                field: "name".to_string()
            })
        );
    }

    #[test]
    fn placeholder_image_url_is_invalid() {
        let raw = r#"[{"name":"Gion","description":"d","image_url":"画像のURL"}]"#;
        let err = validate(raw).unwrap_err();
        assert_eq!(err.reason(), "invalid-field");
        assert!(err.to_string().contains("image_url"));
    }
}
