/// The prompt used to ask a model for a structured re-parse of one
/// ingredient line.
///
/// The prompt is loaded from `prompt.txt` at compile time using the
/// `include_str!` macro, making it easy to edit without dealing with
/// Rust string syntax.
pub const INGREDIENT_REPARSE_PROMPT: &str = include_str!("prompt.txt");

/// Fill the line into the re-parse prompt.
pub fn build_reparse_prompt(line: &str) -> String {
    INGREDIENT_REPARSE_PROMPT.replace("{{LINE}}", line.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_embedded() {
        assert!(!INGREDIENT_REPARSE_PROMPT.is_empty());
        assert!(INGREDIENT_REPARSE_PROMPT.contains("{{LINE}}"));
        assert!(INGREDIENT_REPARSE_PROMPT.contains("\"confidence\""));
    }

    #[test]
    fn test_build_reparse_prompt() {
        let prompt = build_reparse_prompt("  3 cloves garlic, minced ");
        assert!(prompt.ends_with("Line: 3 cloves garlic, minced\n"));
        assert!(!prompt.contains("{{LINE}}"));
    }
}
