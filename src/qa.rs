//! Prompt assembly and answer generation.
//!
//! The model only ever sees the context assembled here: either the chunks
//! retrieved from the document index or the document's full text. The
//! system instruction confines it to that context and asks it to say so
//! when the answer is not there.

use tracing::{debug, info};

use crate::completion::{Completer, Prompt};
use crate::error::AnswerGenerationError;

/// Returned instead of calling a model when no completion provider is configured.
pub const DISABLED_ANSWER: &str =
    "[AI answering is disabled in this deployment. Configure a completion provider to enable it.]";

const SYSTEM_INSTRUCTION: &str = "You answer questions about a single document. \
Base your answer *only* on the document text supplied by the user. \
If the answer is not found in that text, state clearly that you cannot find \
the answer in the document. Do not use outside knowledge.";

/// The document text a question is answered against.
#[derive(Debug, Clone)]
pub enum QaContext {
    /// Best-matching chunks, most relevant first.
    Retrieved(Vec<String>),
    FullText(String),
}

impl QaContext {
    pub fn is_empty(&self) -> bool {
        match self {
            QaContext::Retrieved(chunks) => chunks.iter().all(|c| c.trim().is_empty()),
            QaContext::FullText(text) => text.trim().is_empty(),
        }
    }

    fn render(&self) -> String {
        match self {
            QaContext::Retrieved(chunks) => chunks
                .iter()
                .enumerate()
                .map(|(i, c)| format!("[Excerpt {}]\n{}", i + 1, c.trim()))
                .collect::<Vec<_>>()
                .join("\n\n"),
            QaContext::FullText(text) => text.trim().to_string(),
        }
    }
}

pub fn build_prompt(filename: &str, question: &str, context: &QaContext) -> Prompt {
    let label = match context {
        QaContext::Retrieved(_) => "Relevant excerpts",
        QaContext::FullText(_) => "Document text",
    };
    let user = format!(
        "Document: {}\n\n{}:\n---\n{}\n---\n\nQuestion: {}\n\nAnswer:",
        filename,
        label,
        context.render(),
        question.trim()
    );
    Prompt {
        system: SYSTEM_INSTRUCTION.to_string(),
        user,
    }
}

/// Ask the completion model. An empty context is still sent; the model is
/// expected to report that the answer is not in the document.
pub async fn answer(
    completer: &dyn Completer,
    filename: &str,
    question: &str,
    context: &QaContext,
) -> Result<String, AnswerGenerationError> {
    if !completer.is_enabled() {
        return Ok(DISABLED_ANSWER.to_string());
    }

    if context.is_empty() {
        info!(filename, "answering with empty document context");
    }

    let prompt = build_prompt(filename, question, context);
    debug!(
        model = completer.model_name(),
        prompt_chars = prompt.len(),
        "requesting completion"
    );

    let text = completer
        .complete(&prompt)
        .await
        .map_err(|e| AnswerGenerationError(format!("{:#}", e)))?;

    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::DisabledCompleter;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingCompleter {
        prompts: Mutex<Vec<Prompt>>,
    }

    #[async_trait]
    impl Completer for RecordingCompleter {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, prompt: &Prompt) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.clone());
            Ok("  The document says revenue grew 10%.\n".to_string())
        }
    }

    struct FailingCompleter;

    #[async_trait]
    impl Completer for FailingCompleter {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _prompt: &Prompt) -> Result<String> {
            bail!("upstream returned 503")
        }
    }

    #[test]
    fn prompt_carries_context_and_question() {
        let ctx = QaContext::Retrieved(vec!["Revenue grew 10%.".into(), "Costs fell.".into()]);
        let prompt = build_prompt("report.pdf", "What was revenue growth?", &ctx);
        assert!(prompt.system.contains("*only*"));
        assert!(prompt.user.contains("report.pdf"));
        assert!(prompt.user.contains("[Excerpt 1]\nRevenue grew 10%."));
        assert!(prompt.user.contains("[Excerpt 2]\nCosts fell."));
        assert!(prompt.user.contains("Question: What was revenue growth?"));
    }

    #[test]
    fn full_text_prompt_is_labelled() {
        let prompt = build_prompt("a.pdf", "q", &QaContext::FullText("body".into()));
        assert!(prompt.user.contains("Document text:\n---\nbody\n---"));
    }

    #[tokio::test]
    async fn empty_context_still_calls_the_model() {
        let completer = RecordingCompleter {
            prompts: Mutex::new(Vec::new()),
        };
        let ctx = QaContext::Retrieved(Vec::new());
        assert!(ctx.is_empty());

        let answer = answer(&completer, "blank.pdf", "Anything?", &ctx)
            .await
            .unwrap();
        assert_eq!(answer, "The document says revenue grew 10%.");
        assert_eq!(completer.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disabled_provider_yields_placeholder() {
        let answer = answer(
            &DisabledCompleter,
            "a.pdf",
            "q",
            &QaContext::FullText("text".into()),
        )
        .await
        .unwrap();
        assert_eq!(answer, DISABLED_ANSWER);
    }

    #[tokio::test]
    async fn provider_failure_is_an_answer_error() {
        let err = answer(&FailingCompleter, "a.pdf", "q", &QaContext::FullText("t".into()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
