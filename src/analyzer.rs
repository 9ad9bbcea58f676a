//! External consistency analyzer: batched contradiction scoring and
//! narrative synthesis over a path.
//!
//! The engine never talks to the network directly — it goes through the
//! [`ConsistencyAnalyzer`] trait so tests can substitute a scripted fake.
//! [`GeminiAnalyzer`] is the production implementation: a synchronous
//! `ureq` client for the Gemini `generateContent` API with a bounded
//! timeout. One request carries a whole batch; the call is all-or-nothing.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::error::AnalyzerError;
use crate::graph::detail::DetailedPath;

/// Batched analysis interface.
pub trait ConsistencyAnalyzer: Send + Sync {
    /// Score the contradiction (0–100) of each question's pooled answers.
    ///
    /// The input maps question text to the answers collected from the
    /// books sharing it. The output maps question text to a percentage;
    /// questions may be missing from the output (callers apply a default).
    fn analyze(&self, questions: &BTreeMap<String, Vec<String>>)
    -> Result<HashMap<String, u8>, AnalyzerError>;

    /// Produce a narrative analysis of the scholarly path.
    fn narrate(
        &self,
        path: &DetailedPath,
        start_question: &str,
        end_question: &str,
    ) -> Result<String, AnalyzerError>;
}

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key passed as a query parameter.
    pub api_key: String,
    /// Base URL for the generative language API.
    pub base_url: String,
    /// Model used for consistency scoring.
    pub model: String,
    /// Model used for narrative synthesis.
    pub narrative_model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Default configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.0-flash-lite".into(),
            narrative_model: "gemini-2.5-flash-lite".into(),
            timeout_secs: 60,
        }
    }
}

/// Client for the Gemini REST API.
pub struct GeminiAnalyzer {
    config: GeminiConfig,
}

impl GeminiAnalyzer {
    /// Create a new client with the given configuration.
    pub fn new(config: GeminiConfig) -> Self {
        Self { config }
    }

    /// POST a generateContent request and return the generated text.
    fn generate(&self, model: &str, payload: serde_json::Value) -> Result<String, AnalyzerError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, model, self.config.api_key
        );
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build();

        let body = serde_json::to_string(&payload).map_err(|e| AnalyzerError::Parse {
            message: format!("JSON serialize error: {e}"),
        })?;

        tracing::info!(model, "issuing analyzer request");
        let response = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body)
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => AnalyzerError::Status { code },
                ureq::Error::Transport(t) => {
                    let message = t.to_string();
                    if message.contains("timed out") || message.contains("timeout") {
                        AnalyzerError::Timeout {
                            timeout_secs: self.config.timeout_secs,
                        }
                    } else {
                        AnalyzerError::Network { message }
                    }
                }
            })?;

        let status = response.status();
        let text = response.into_string().map_err(|e| AnalyzerError::Network {
            message: format!("failed to read response body: {e}"),
        })?;
        tracing::debug!(status, bytes = text.len(), "analyzer response received");

        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| AnalyzerError::Parse {
                message: format!("response is not JSON: {e}"),
            })?;
        extract_text(&json).map(str::to_string)
    }
}

impl ConsistencyAnalyzer for GeminiAnalyzer {
    fn analyze(
        &self,
        questions: &BTreeMap<String, Vec<String>>,
    ) -> Result<HashMap<String, u8>, AnalyzerError> {
        let prompt = consistency_prompt(questions)?;
        let payload = serde_json::json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "temperature": 0.1,
                "maxOutputTokens": 4096
            }
        });
        let text = self.generate(&self.config.model, payload)?;
        parse_scores(&text)
    }

    fn narrate(
        &self,
        path: &DetailedPath,
        start_question: &str,
        end_question: &str,
    ) -> Result<String, AnalyzerError> {
        let prompt = narrative_prompt(path, start_question, end_question);
        let payload = serde_json::json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "temperature": 0.7,
                "maxOutputTokens": 8192,
                "topP": 0.8,
                "topK": 40
            }
        });
        let text = self.generate(&self.config.narrative_model, payload)?;
        let narrative = text.trim();
        if narrative.is_empty() {
            return Err(AnalyzerError::Parse {
                message: "empty narrative in response".into(),
            });
        }
        Ok(narrative.to_string())
    }
}

/// Pull the generated text out of a generateContent response.
fn extract_text(response: &serde_json::Value) -> Result<&str, AnalyzerError> {
    response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AnalyzerError::Parse {
            message: "no candidates[0].content.parts[0].text in response".into(),
        })
}

/// Prompt asking for a contradiction percentage per question.
fn consistency_prompt(
    questions: &BTreeMap<String, Vec<String>>,
) -> Result<String, AnalyzerError> {
    let listing =
        serde_json::to_string_pretty(questions).map_err(|e| AnalyzerError::Parse {
            message: format!("JSON serialize error: {e}"),
        })?;
    Ok(format!(
        "Analyze the consistency of answers to questions from different books.\n\
         For each question, determine the contradiction percentage (0-100):\n\
         - 0% = answers are completely consistent/parallel\n\
         - 100% = answers are completely contradictory\n\
         - Intermediate values = partial contradictions\n\n\
         Questions and their answers from different books:\n{listing}\n\n\
         Return ONLY a JSON object in this exact format (no markdown, no explanation):\n\
         {{\"Question 1 text\": contradiction_percentage_integer, \
         \"Question 2 text\": contradiction_percentage_integer}}"
    ))
}

/// Prompt asking for a flowing narrative of the scholarly path.
fn narrative_prompt(path: &DetailedPath, start_question: &str, end_question: &str) -> String {
    let mut prompt = format!(
        "You are a scholar analyzing a discourse path through related texts.\n\n\
         Please create a narrative analysis of how different authors build upon, \
         contradict, or complement each other's views as they discuss related \
         questions. Focus on the scholarly conversation and intellectual \
         development of ideas.\n\n\
         **Starting Question:** {start_question}\n\n\
         **Ending Question:** {end_question}\n\n\
         **Path Through Books:**\n"
    );

    for (i, book) in path.books.iter().enumerate() {
        prompt.push_str(&format!("\n**Book {}: {}**\n", i + 1, book.book_title));
        for (j, question) in book.questions.iter().enumerate() {
            prompt.push_str(&format!("  Question {}: {}\n", j + 1, question));
        }
    }

    prompt.push_str(
        "\n\nPlease analyze this scholarly path and create a flowing narrative that:\n\n\
         1. Starts with how the first author approaches the starting question\n\
         2. Shows how subsequent authors build upon, challenge, or refine the discourse\n\
         3. Identifies key points of agreement and disagreement between authors\n\
         4. Traces the intellectual development from the start question to the end question\n\
         5. Concludes with how the final author addresses the ending question\n\n\
         Write in an academic but accessible style. Focus on the scholarly \
         conversation and how ideas evolve through the path. Make it read like a \
         literature review that traces intellectual development.\n\n\
         **Length:** Aim for 300-500 words. Be comprehensive but concise.\n",
    );

    prompt
}

/// Strip a leading/trailing markdown code fence from model output.
fn strip_markdown_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse the model's `{question: percentage}` object, clamping to 0–100.
fn parse_scores(text: &str) -> Result<HashMap<String, u8>, AnalyzerError> {
    let cleaned = strip_markdown_fences(text);
    let raw: HashMap<String, serde_json::Value> =
        serde_json::from_str(cleaned).map_err(|e| AnalyzerError::Parse {
            message: format!("expected a JSON object of percentages: {e}"),
        })?;

    let mut scores = HashMap::with_capacity(raw.len());
    for (question, value) in raw {
        let pct = value.as_f64().ok_or_else(|| AnalyzerError::Parse {
            message: format!("non-numeric percentage for question \"{question}\""),
        })?;
        scores.insert(question, pct.clamp(0.0, 100.0).round() as u8);
    }
    Ok(scores)
}
