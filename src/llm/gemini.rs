use super::{QuestionCandidate, QuestionGenerator, CANDIDATES_PER_CHUNK};
use crate::config::LlmConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Gemini `generateContent` client
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestions {
    #[serde(default)]
    questions: Vec<QuestionCandidate>,
}

impl GeminiGenerator {
    pub fn new(config: &LlmConfig, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        )
    }
}

fn prompt(transcript_chunk: &str) -> String {
    format!(
        "Based on the following lecture transcript, generate exactly {} different multiple-choice questions.\n\
         Each question should be distinct and cover different aspects of the transcript content.\n\
         For each question, provide four distinct answer options, clearly indicate the correct answer \
         (copied verbatim from the options), and include a simple, clear explanation of why it is correct.\n\
         Ensure all questions are directly relevant to the transcript content.\n\n\
         Transcript:\n{}",
        CANDIDATES_PER_CHUNK, transcript_chunk
    )
}

fn request_body(transcript_chunk: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt(transcript_chunk) }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "questions": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "question_text": { "type": "STRING" },
                                "options": { "type": "ARRAY", "items": { "type": "STRING" } },
                                "correct_answer": { "type": "STRING" },
                                "explanation": { "type": "STRING" }
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Pull the candidates out of a `generateContent` response body.
///
/// Malformed candidates are dropped; at most three are kept.
fn parse_response(body: &Value) -> Result<Vec<QuestionCandidate>> {
    let text = body
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .context("LLM response did not contain candidates")?;

    let generated: GeneratedQuestions =
        serde_json::from_str(text).context("Failed to decode questions JSON from LLM response")?;

    let mut candidates = Vec::new();
    for candidate in generated.questions {
        if candidates.len() == CANDIDATES_PER_CHUNK {
            break;
        }
        if candidate.is_well_formed() {
            candidates.push(candidate);
        } else {
            warn!(
                "Dropping malformed question candidate ({} options): {}",
                candidate.options.len(),
                candidate.question_text
            );
        }
    }

    Ok(candidates)
}

#[async_trait::async_trait]
impl QuestionGenerator for GeminiGenerator {
    async fn generate_candidates(&self, transcript_chunk: &str) -> Result<Vec<QuestionCandidate>> {
        info!(
            "Requesting question candidates from {} ({} chars of transcript)",
            self.model,
            transcript_chunk.len()
        );

        let response = self
            .client
            .post(self.url())
            .json(&request_body(transcript_chunk))
            .send()
            .await
            .context("Failed to call Gemini API")?
            .error_for_status()
            .context("Gemini API returned an error status")?;

        let body: Value = response
            .json()
            .await
            .context("Failed to read Gemini API response")?;

        parse_response(&body)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
