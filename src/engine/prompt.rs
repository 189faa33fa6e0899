//! Instruction and response-schema construction shared by the remote engines.

use serde_json::{Value, json};

/// Build the free-text instruction embedding the caller's preference and
/// the reverse-image-search narrative.
///
/// The confidence band for non-identifying images is a calibration
/// instruction to the model, not a locally enforced invariant.
pub fn instruction(hints: &str, preference: Option<&str>) -> String {
    let mut instruction = String::from(
        "Analyze this photograph and determine where it was most likely taken. \
         Report latitude and longitude in decimal degrees, the nearest city, the country, \
         your reasoning, and a short summary of the visual evidence.",
    );
    if let Some(preference) = preference {
        instruction.push_str("\nThe user suspects the location is: ");
        instruction.push_str(preference);
        instruction.push_str(". Treat this as a weak prior, not as ground truth.");
    }
    if !hints.is_empty() {
        instruction.push_str("\nReverse image search context (advisory, may be irrelevant): ");
        instruction.push_str(hints);
    }
    instruction.push_str(
        "\nReport confidence between 0 and 1. \
         If the image lacks uniquely identifying visual content, \
         report confidence between 0.4 and 0.6.",
    );
    instruction
}

/// The seven-field guess schema sent as a structured-output constraint.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "latitude": {"type": "number"},
            "longitude": {"type": "number"},
            "city": {"type": "string"},
            "country": {"type": "string"},
            "confidence": {"type": "number"},
            "reasoning": {"type": "string"},
            "visual_analysis_summary": {"type": "string"},
        },
        "required": [
            "latitude",
            "longitude",
            "city",
            "country",
            "confidence",
            "reasoning",
            "visual_analysis_summary",
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_embeds_preference_and_hints_ok() {
        let instruction = instruction("neon shop signs in Vietnamese", Some("coastal"));
        assert!(instruction.contains("coastal"));
        assert!(instruction.contains("neon shop signs in Vietnamese"));
        assert!(instruction.contains("between 0.4 and 0.6"));
    }

    #[test]
    fn instruction_omits_empty_parts_ok() {
        let instruction = instruction("", None);
        assert!(!instruction.contains("suspects"));
        assert!(!instruction.contains("Reverse image search"));
    }

    #[test]
    fn schema_requires_all_guess_fields_ok() {
        let schema = response_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 7);
        for field in required {
            assert!(schema["properties"][field.as_str().unwrap()].is_object());
        }
    }
}
