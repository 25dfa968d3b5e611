use tracing::{debug, warn};

use crate::llm::{GenerationRequest, TargetLanguage, LLM};

const SEPARATOR: &str = "###SEPARATOR###";

/// Translates generated English text into the target language.
///
/// Translation is best effort: English targets, model errors, empty output
/// and batch count mismatches all return the input unchanged.
pub struct Translator<'a> {
    llm: &'a dyn LLM,
}

impl<'a> Translator<'a> {
    pub fn new(llm: &'a dyn LLM) -> Self {
        Self { llm }
    }

    fn needs_translation(target: &TargetLanguage) -> bool {
        target.code().is_some() && !target.is_english()
    }

    pub async fn translate(&self, text: &str, target: &TargetLanguage) -> String {
        if !Self::needs_translation(target) || text.trim().is_empty() {
            return text.to_string();
        }

        let label = target.label();
        let request = GenerationRequest::new(text)
            .with_system(format!(
                "You are a professional translator. Translate English to {label}.\n\
                 Rules:\n\
                 - Translate ONLY the given text\n\
                 - Do NOT add explanations or comments\n\
                 - Use natural {label} expressions\n\
                 - Output ONLY the translated text"
            ))
            .with_temperature(0.1)
            .with_max_new_tokens(256);

        match self.llm.generate(&request).await {
            Ok(response) if response.content.trim().chars().count() >= 2 => response.content.trim().to_string(),
            Ok(_) => {
                warn!("⚠️ Empty translation to {}, keeping original", label);
                text.to_string()
            }
            Err(e) => {
                warn!("⚠️ Translation to {} failed, keeping original: {}", label, e);
                text.to_string()
            }
        }
    }

    /// Translate several texts in one call, joined by a separator the model
    /// is asked to keep
    pub async fn translate_batch(&self, texts: &[String], target: &TargetLanguage) -> Vec<String> {
        if texts.is_empty() || !Self::needs_translation(target) {
            return texts.to_vec();
        }

        let label = target.label();
        let combined = texts.join(&format!("\n{}\n", SEPARATOR));
        let request = GenerationRequest::new(combined)
            .with_system(format!(
                "You are a professional translator. Translate the following texts from English to {label}.\n\
                 Rules:\n\
                 - Translate each text separated by {SEPARATOR}\n\
                 - Keep the {SEPARATOR} between translations\n\
                 - Do NOT add explanations or comments\n\
                 - Output ONLY the translations with {SEPARATOR} between them"
            ))
            .with_temperature(0.1)
            .with_max_new_tokens(1024);

        let output = match self.llm.generate(&request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!("⚠️ Batch translation to {} failed, keeping originals: {}", label, e);
                return texts.to_vec();
            }
        };

        let translated: Vec<String> = output.split(SEPARATOR).map(|t| t.trim().to_string()).collect();
        if translated.len() != texts.len() {
            warn!(
                "⚠️ Batch translation returned {} items for {}, keeping originals",
                translated.len(),
                texts.len()
            );
            return texts.to_vec();
        }

        debug!("Translated {} texts to {}", texts.len(), label);
        translated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedLLM;

    #[tokio::test]
    async fn test_english_target_is_noop() {
        let llm = ScriptedLLM::replying(&[]);
        let translator = Translator::new(&llm);
        assert_eq!(translator.translate("Hello", &TargetLanguage::new("en")).await, "Hello");
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_translation_trimmed() {
        let llm = ScriptedLLM::replying(&["  안녕하세요  "]);
        let translated = Translator::new(&llm)
            .translate("Hello", &TargetLanguage::new("ko"))
            .await;
        assert_eq!(translated, "안녕하세요");
        assert_eq!(llm.requests()[0].max_new_tokens, 256);
    }

    #[tokio::test]
    async fn test_failure_keeps_original() {
        let llm = ScriptedLLM::new(vec![Err("boom".to_string()), Ok(" ".to_string())]);
        let translator = Translator::new(&llm);
        let target = TargetLanguage::new("ja");
        assert_eq!(translator.translate("Hello", &target).await, "Hello");
        assert_eq!(translator.translate("Hello", &target).await, "Hello");
    }

    #[tokio::test]
    async fn test_batch_split_on_separator() {
        let llm = ScriptedLLM::replying(&["하나\n###SEPARATOR###\n둘"]);
        let texts = vec!["one".to_string(), "two".to_string()];
        let translated = Translator::new(&llm)
            .translate_batch(&texts, &TargetLanguage::new("ko"))
            .await;
        assert_eq!(translated, vec!["하나", "둘"]);
        assert!(llm.requests()[0].prompt.contains("one\n###SEPARATOR###\ntwo"));
    }

    #[tokio::test]
    async fn test_batch_count_mismatch_keeps_originals() {
        let llm = ScriptedLLM::replying(&["하나 둘"]);
        let texts = vec!["one".to_string(), "two".to_string()];
        let translated = Translator::new(&llm)
            .translate_batch(&texts, &TargetLanguage::new("ko"))
            .await;
        assert_eq!(translated, texts);
    }
}
