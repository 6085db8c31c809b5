//! Prompt templates for the two model passes.
//!
//! Kept in one place so prompt wording can be tuned without touching
//! orchestration. The localization prompt is deliberately terse: the grid
//! labels in the image and the enumerated allowed values in the schema carry
//! most of the constraint.

/// System prompt for the localization pass.
pub const LOCALIZATION_SYSTEM_PROMPT: &str = "You are an assistant that locates \
information on scanned documents. The document image carries a red coordinate \
grid; columns are labeled with letters and rows with numbers. Answer only with \
grid cell labels.";

/// Default system prompt for the extraction pass, used when the caller does
/// not supply one.
pub const DEFAULT_EXTRACTION_SYSTEM_PROMPT: &str = "You are an assistant that \
extracts structured data from scanned documents. Read the image carefully and \
fill in every requested field exactly as written on the document.";

/// User prompt asking the model to name the grid cells containing a field.
pub fn localization_prompt(field_description: &str) -> String {
    format!(
        "Your task is to extract the sectors where {field_description} is located. \
         Be as consistent and precise as possible."
    )
}

/// Description of the cell-label property, enumerating every allowed value
/// for the given grid shape so the model cannot invent labels.
pub fn cell_label_description(rows: u32, cols: u32) -> String {
    let mut allowed = Vec::with_capacity((rows * cols) as usize);
    for row in 1..=rows {
        for col in 0..cols {
            let letter = char::from(b'A' + col as u8);
            allowed.push(format!("{letter}{row}"));
        }
    }
    format!(
        "Cell labels identifying the grid sectors that contain the field. \
         Allowed values: {}.",
        allowed.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localization_prompt_names_the_field() {
        let prompt = localization_prompt("the IBAN of the account holder");
        assert!(prompt.contains("the IBAN of the account holder"));
        assert!(prompt.contains("sectors"));
    }

    #[test]
    fn cell_label_description_enumerates_whole_grid() {
        let desc = cell_label_description(10, 10);
        assert!(desc.contains("A1,"));
        assert!(desc.contains("J10."));
        // 100 labels joined by 99 separators.
        assert_eq!(desc.matches(", ").count(), 99);
    }

    #[test]
    fn cell_label_description_respects_shape() {
        let desc = cell_label_description(2, 3);
        assert!(desc.contains("A1, B1, C1, A2, B2, C2."));
        assert!(!desc.contains("D1"));
        assert!(!desc.contains("A3"));
    }
}
