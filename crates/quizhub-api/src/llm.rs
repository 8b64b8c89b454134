use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use quizhub_types::models::Question;

pub const DEFAULT_LLM_URL: &str = "https://api.mistral.ai/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "mistral-large-latest";

const QUESTIONS_PER_QUIZ: usize = 5;
const OPTIONS_PER_QUESTION: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unusable completion: {0}")]
    Malformed(String),
}

/// Produces the questions of a new quiz. Implementations must not touch
/// quota or storage; the caller does both once questions come back.
#[async_trait]
pub trait QuizGenerator: Send + Sync {
    async fn generate(&self, topic: &str, difficulty: &str, language: &str) -> Result<Vec<Question>, LlmError>;
}

/// Chat-completions client for Mistral's hosted API.
pub struct MistralClient {
    http: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
}

impl MistralClient {
    pub fn new(api_key: String, url: String, model: String) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(90)).build()?;
        Ok(Self {
            http,
            url,
            model,
            api_key,
        })
    }
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[async_trait]
impl QuizGenerator for MistralClient {
    async fn generate(&self, topic: &str, difficulty: &str, language: &str) -> Result<Vec<Question>, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": build_prompt(topic, difficulty, language) }],
        });

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let completion: Completion = resp.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Malformed("no choices in completion".into()))?;

        debug!("Completion for '{}' is {} chars", topic, content.len());
        extract_questions(&content)
    }
}

pub fn build_prompt(topic: &str, difficulty: &str, language: &str) -> String {
    format!(
        "Generate a {difficulty} quiz on {topic} in {language} with {QUESTIONS_PER_QUIZ} questions \
         and {OPTIONS_PER_QUESTION} options each.\n\n\
         Requirements:\n\
         - Questions should be accurate, clear, and appropriate for {difficulty} level\n\
         - Each question must have exactly {OPTIONS_PER_QUESTION} options with only one correct answer\n\
         - Options should be plausible and distinct from each other\n\
         - Mix factual, conceptual and analytical questions\n\
         - The answer must be copied exactly from the options\n\n\
         Return the questions in JSON, wrapped in:\n\
         ```json\n\
         {{\"quiz\": {{\"questions\": [\
         {{\"question\": \"What is the capital of France?\", \
         \"options\": [\"Berlin\", \"Madrid\", \"Paris\", \"Rome\"], \
         \"answer\": \"Paris\"}}]}}}}\n\
         ```"
    )
}

#[derive(Deserialize)]
struct QuizEnvelope {
    quiz: QuizBody,
}

#[derive(Deserialize)]
struct QuizBody {
    questions: Vec<Question>,
}

/// Pull `{ "quiz": { "questions": [...] } }` out of a completion, either from
/// a ```` ```json ```` fence or from the whole text.
pub fn extract_questions(content: &str) -> Result<Vec<Question>, LlmError> {
    let json_text = match content.split_once("```json") {
        Some((_, rest)) => rest.split("```").next().unwrap_or(rest),
        None => content,
    }
    .trim();

    let envelope: QuizEnvelope =
        serde_json::from_str(json_text).map_err(|e| LlmError::Malformed(format!("invalid quiz JSON: {e}")))?;

    if envelope.quiz.questions.is_empty() {
        return Err(LlmError::Malformed("no questions".into()));
    }
    Ok(envelope.quiz.questions)
}
