//! Grounded answer synthesis.
//!
//! The prompt is a fixed, versioned asset. Retrieved passages are numbered and always embedded
//! ahead of the question, and the model is told to answer from them alone, to say when they are
//! insufficient, and to cite the passage numbers it relied on. With no passages the synthesizer
//! answers on its own and never calls the model.

use crate::generation::{GenerationClient, GenerationClientError, GenerationRequest};

/// Version tag of [`PROMPT_TEMPLATE`].
pub const PROMPT_VERSION: &str = "grounded-qa/v1";

/// Prompt template; `{language}`, `{context}`, and `{question}` are substituted.
pub const PROMPT_TEMPLATE: &str = "You are a research assistant answering questions about a \
collection of documents.

Rules:
- Answer using only the numbered context passages below. Do not rely on outside knowledge.
- If the passages do not contain the information needed, say clearly that the provided context \
is insufficient to answer.
- Cite the passages you rely on by their numbers, for example [1] or [2][3].
- Explain technical concepts clearly and concisely.{language}

Context:
{context}

Question: {question}

Answer:";

/// Answer returned when retrieval produced nothing to ground on.
pub const INSUFFICIENT_CONTEXT_ANSWER: &str =
    "The indexed documents do not contain enough information to answer this question.";

/// Assembles the grounded prompt and forwards it to the generative model.
pub struct AnswerSynthesizer {
    client: Box<dyn GenerationClient>,
    model: String,
    temperature: f32,
    language: Option<String>,
}

impl AnswerSynthesizer {
    /// Create a synthesizer over `client`.
    pub fn new(
        client: Box<dyn GenerationClient>,
        model: impl Into<String>,
        temperature: f32,
        language: Option<String>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
            language,
        }
    }

    /// Model identifier used for generation.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Render the prompt for `question` grounded on `contexts`.
    pub fn build_prompt(&self, question: &str, contexts: &[String]) -> String {
        let context = contexts
            .iter()
            .enumerate()
            .map(|(idx, text)| format!("[{}] {}", idx + 1, text.trim()))
            .collect::<Vec<_>>()
            .join("\n\n");
        let language = self
            .language
            .as_deref()
            .map(|lang| format!("\n- Write the answer in {lang}."))
            .unwrap_or_default();

        PROMPT_TEMPLATE
            .replace("{language}", &language)
            .replace("{context}", &context)
            .replace("{question}", question.trim())
    }

    /// Produce an answer for `question` from the retrieved `contexts`.
    pub async fn synthesize(
        &self,
        question: &str,
        contexts: &[String],
    ) -> Result<String, GenerationClientError> {
        if contexts.iter().all(|text| text.trim().is_empty()) {
            tracing::debug!("No retrieved context; skipping generation");
            return Ok(INSUFFICIENT_CONTEXT_ANSWER.to_string());
        }

        let prompt = self.build_prompt(question, contexts);
        tracing::debug!(
            prompt_version = PROMPT_VERSION,
            model = %self.model,
            contexts = contexts.len(),
            prompt_chars = prompt.chars().count(),
            "Synthesizing answer"
        );

        let answer = self
            .client
            .generate(GenerationRequest {
                model: self.model.clone(),
                prompt,
                temperature: self.temperature,
            })
            .await?;
        Ok(answer.trim().to_string())
    }
}
