//! Order history and meal suggestion types

use serde::{Deserialize, Serialize};

/// Delivery platform an order was placed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    #[serde(alias = "美团")]
    Meituan,
    #[serde(alias = "饿了么")]
    Eleme,
}

impl Platform {
    /// Wire names accepted in extraction output
    pub const NAMES: [&'static str; 2] = ["Meituan", "Eleme"];
}

/// A past order mined from a screenshot
///
/// Records are kept in extraction order for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub restaurant: String,
    pub items: Vec<String>,
    pub total: f64,
    pub platform: Platform,
    pub date: String,
}

/// The model's pick for the current command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub suggested_meal: String,
    pub restaurant: String,
    /// Short sentence read back to the user
    pub spoken_response: String,
    /// Whether the current location differs from the user's usual addresses
    pub is_new_location: bool,
}

impl Suggestion {
    /// Line spoken once the order is confirmed
    #[must_use]
    pub fn confirmation_line(&self) -> String {
        format!(
            "Order placed for {} from {}. Bon appétit!",
            self.suggested_meal, self.restaurant
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_uses_camel_case_fields() {
        let suggestion: Suggestion = serde_json::from_str(
            r#"{"suggestedMeal":"Beef Noodles","restaurant":"Lanzhou Noodle House","spokenResponse":"Noodles again?","isNewLocation":false}"#,
        )
        .unwrap();

        assert_eq!(suggestion.suggested_meal, "Beef Noodles");
        assert!(!suggestion.is_new_location);
        assert_eq!(
            suggestion.confirmation_line(),
            "Order placed for Beef Noodles from Lanzhou Noodle House. Bon appétit!"
        );
    }

    #[test]
    fn test_platform_accepts_native_names() {
        let platform: Platform = serde_json::from_str("\"饿了么\"").unwrap();
        assert_eq!(platform, Platform::Eleme);

        assert!(serde_json::from_str::<Platform>("\"UberEats\"").is_err());
    }
}
