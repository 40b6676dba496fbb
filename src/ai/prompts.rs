//! Prompt text sent with each request

use crate::Result;
use crate::order::OrderRecord;

/// Instruction accompanying the screenshot
pub const EXTRACTION_PROMPT: &str = "Extract food order history from this screenshot (Meituan/Eleme). List orders: restaurant name, dishes, total price, platform. Return JSON array.";

/// Build the decision prompt for a spoken command
///
/// # Errors
///
/// Returns error if the history cannot be serialized
pub fn decision_prompt(command: &str, history: &[OrderRecord], location: &str) -> Result<String> {
    let history = serde_json::to_string(history)?;

    Ok(format!(
        r#"USER COMMAND: "{command}"
CURRENT LOCATION: "{location}"
USER HISTORY: {history}

TASK:
1. Analyze the command and match with order habits.
2. If location is far from common addresses, suggest creating a new address verbally.

OUTPUT FORMAT (JSON ONLY):
{{
  "suggestedMeal": "String",
  "restaurant": "String",
  "spokenResponse": "A friendly short sentence for the user describing the choice.",
  "isNewLocation": boolean
}}"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Platform;

    #[test]
    fn test_decision_prompt_carries_inputs() {
        let history = vec![OrderRecord {
            id: "1".to_string(),
            restaurant: "Lanzhou Noodle House".to_string(),
            items: vec!["Beef Noodles".to_string()],
            total: 25.0,
            platform: Platform::Meituan,
            date: "2024-05-01".to_string(),
        }];

        let prompt = decision_prompt("I want noodles", &history, "Haidian").unwrap();

        assert!(prompt.starts_with(r#"USER COMMAND: "I want noodles""#));
        assert!(prompt.contains(r#"CURRENT LOCATION: "Haidian""#));
        assert!(prompt.contains(r#""restaurant":"Lanzhou Noodle House""#));
        assert!(prompt.contains("\"isNewLocation\": boolean"));
    }

    #[test]
    fn test_empty_history_is_an_empty_array() {
        let prompt = decision_prompt("anything", &[], "").unwrap();
        assert!(prompt.contains("USER HISTORY: []"));
    }
}
