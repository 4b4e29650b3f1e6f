//! Chat-model collaborators.
//!
//! Claim extraction and verdict generation over an OpenAI-compatible
//! chat completion endpoint. One client is built at startup and shared
//! by both collaborators.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;

use crate::collaborator::{ClaimExtractor, VerdictProvider, VerdictRequest};
use crate::config::ModelConfig;
use crate::error::FactCheckError;
use crate::verdict::format_evidence;

const EXTRACTOR_SYSTEM_PROMPT: &str =
    "You are an AI assistant that extracts clear, concise, and fact-checkable claims from text.";

const VERDICT_SYSTEM_PROMPT: &str = "You are a highly knowledgeable AI assistant specializing in \
     quick, real-time fact-checking for debates, with access to recent web information and \
     debate context.";

/// Build the chat client shared by the LLM collaborators.
pub fn chat_client(api_base: &str, api_key: &str) -> Client<OpenAIConfig> {
    let config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(api_base);
    Client::with_config(config)
}

/// Claim extraction through a chat model.
pub struct LlmClaimExtractor {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlmClaimExtractor {
    pub fn new(client: Client<OpenAIConfig>, config: &ModelConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            max_tokens: config.extraction_max_tokens,
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl ClaimExtractor for LlmClaimExtractor {
    async fn extract(&self, transcript: &str) -> Result<Vec<String>, FactCheckError> {
        let prompt = format!(
            "Extract the key factual claims from the following transcript. \
             List each claim on a new line starting with a number:\n\n{}\n\nExtracted claims:",
            transcript
        );

        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: EXTRACTOR_SYSTEM_PROMPT.into(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: prompt.into(),
                name: None,
            }),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build()?;

        let response = self.client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(split_claim_lines(&content))
    }
}

/// Verdict generation through a chat model.
pub struct LlmVerdictProvider {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlmVerdictProvider {
    pub fn new(client: Client<OpenAIConfig>, config: &ModelConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            max_tokens: config.verdict_max_tokens,
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl VerdictProvider for LlmVerdictProvider {
    async fn check(&self, request: &VerdictRequest<'_>) -> Result<String, FactCheckError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: VERDICT_SYSTEM_PROMPT.into(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: verdict_prompt(request).into(),
                name: None,
            }),
        ];

        let completion = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(self.max_tokens)
            .temperature(self.temperature)
            .top_p(1.0)
            .build()?;

        let response = self.client.chat().create(completion).await?;

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

/// Assemble the fact-checking prompt for one claim.
fn verdict_prompt(request: &VerdictRequest<'_>) -> String {
    let context = if request.context.is_empty() {
        "No prior context available."
    } else {
        request.context
    };
    let categories = if request.categories.is_empty() {
        "None".to_string()
    } else {
        request
            .categories
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "## Fact-Checking Request\n\n\
         **Statement to Verify:** \"{}\"\n\n\
         **Debate Context:** {}\n\n\
         **Web Search Results:**\n{}\n\n\
         **Categories:** {}\n\n\
         **Sentiment Score:** {:.2}\n\n\
         ## Instructions\n\
         1. Judge the statement against the web search results and the debate context.\n\
         2. Respond ONLY with a JSON object of the form:\n\
         {{\"Verification\": \"VERIFIED\" or \"PARTIALLY VERIFIED\" or \"NOT VERIFIED\", \
         \"Confidence\": \"HIGH\" or \"MEDIUM\" or \"LOW\", \
         \"Explanation\": \"one or two sentences\", \
         \"Bias\": \"any bias detected in the statement\", \
         \"Sources\": \"sources supporting the verdict\", \
         \"Categories\": \"{}\", \"Sentiment\": \"{:.2}\"}}",
        request.claim,
        context,
        format_evidence(request.evidence),
        categories,
        request.sentiment,
        categories,
        request.sentiment,
    )
}

/// Split a numbered-list response into bare claims.
fn split_claim_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ' ')
                .to_string()
        })
        .filter(|claim| !claim.is_empty())
        .collect()
}
