//! Response schemas for structured output
//!
//! Gemini uses an OpenAPI subset with upper-case type names.

use serde_json::{Value, json};

use crate::order::Platform;

/// Array of past orders read from a screenshot
#[must_use]
pub fn history_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "restaurant": { "type": "STRING" },
                "items": { "type": "ARRAY", "items": { "type": "STRING" } },
                "total": { "type": "NUMBER" },
                "platform": { "type": "STRING", "enum": Platform::NAMES },
                "date": { "type": "STRING" }
            },
            "required": ["restaurant", "items", "total", "platform", "date"]
        }
    })
}

/// A single meal suggestion
#[must_use]
pub fn suggestion_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "suggestedMeal": { "type": "STRING" },
            "restaurant": { "type": "STRING" },
            "spokenResponse": { "type": "STRING" },
            "isNewLocation": { "type": "BOOLEAN" }
        },
        "required": ["suggestedMeal", "restaurant", "spokenResponse", "isNewLocation"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_schema_requires_every_field() {
        let schema = history_schema();
        let required = schema["items"]["required"].as_array().unwrap();

        assert_eq!(required.len(), 5);
        assert_eq!(schema["items"]["properties"]["platform"]["enum"][1], "Eleme");
    }

    #[test]
    fn test_suggestion_schema_fields_match_properties() {
        let schema = suggestion_schema();
        let properties = schema["properties"].as_object().unwrap();

        for field in schema["required"].as_array().unwrap() {
            assert!(properties.contains_key(field.as_str().unwrap()));
        }
    }
}
