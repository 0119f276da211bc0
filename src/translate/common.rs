use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub text: String,
}

/// Convert language code to full language name for clearer prompts
pub fn language_code_to_name(code: &str) -> String {
    let name = match code.to_lowercase().as_str() {
        "en" => "English",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "ru" => "Russian",
        "it" => "Italian",
        "pt" => "Portuguese",
        "pl" => "Polish",
        "nl" => "Dutch",
        "tr" => "Turkish",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "id" => "Indonesian",
        "sv" => "Swedish",
        "da" => "Danish",
        "no" => "Norwegian",
        "fi" => "Finnish",
        "he" => "Hebrew",
        "uk" => "Ukrainian",
        "cs" => "Czech",
        _ => return code.to_string(),
    };
    name.to_string()
}

/// Build the translation prompt, asking for `{"text": ...}` JSON back
pub fn build_translation_prompt(text: &str, from_lang: &str, to_lang: &str) -> String {
    let source_name = language_code_to_name(from_lang);
    let target_name = language_code_to_name(to_lang);

    format!(
        "You are a professional translator of narration scripts.\n\
         \n\
         CRITICAL: You must translate the text from {} to {} ONLY. Do not translate to any other language.\n\
         The target language is: {} (language code: {})\n\
         \n\
         Return ONLY the translation in JSON format as {{\"text\":\"your {} translation here\"}}.\n\
         Do not include any explanations, alternatives, or text in other languages.\n\
         \n\
         [Text to translate]\n\
         {}\n",
        source_name, target_name, target_name, to_lang, target_name, text
    )
}

/// Pull the translation out of a model reply that ignored the JSON format
pub fn clean_translation_response(response: &str) -> String {
    let lines: Vec<&str> = response.lines().collect();

    for &line in &lines {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with("Here is") ||
           trimmed.starts_with("Here are") ||
           trimmed.starts_with("Option") ||
           trimmed.starts_with("Translation:") ||
           trimmed.starts_with("- ") ||
           trimmed.starts_with("* ") {
            continue;
        }

        if trimmed.starts_with("**") && trimmed.ends_with("**") {
            continue;
        }

        if trimmed.len() > 3 {
            return trimmed.to_string();
        }
    }

    for &line in &lines {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    response.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_names() {
        assert_eq!(language_code_to_name("JA"), "Japanese");
        assert_eq!(language_code_to_name("xx"), "xx");
    }

    #[test]
    fn test_prompt_names_both_languages() {
        let prompt = build_translation_prompt("Hello", "en", "ja");
        assert!(prompt.contains("from English to Japanese"));
        assert!(prompt.contains("language code: ja"));
        assert!(prompt.ends_with("Hello\n"));
    }

    #[test]
    fn test_clean_response_skips_preamble() {
        let reply = "Here is the translation:\n\nこんにちは、世界。\n";
        assert_eq!(clean_translation_response(reply), "こんにちは、世界。");
    }
}
