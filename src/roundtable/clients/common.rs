use crate::roundtable::client_wrapper::{ClientError, Message, TokenUsage};
use lazy_static::lazy_static;
use openai_rust::chat;
use openai_rust2 as openai_rust;
use std::time::Duration;

lazy_static! {
    /// Process-wide HTTP client so every provider reuses the same connection pool.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = build_http_client();
}

fn build_http_client() -> reqwest::Client {
    reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(300))
        .build()
        .unwrap_or_else(|err| {
            log::warn!(
                "roundtable::clients::common: falling back to default HTTP client: {}",
                err
            );
            reqwest::Client::new()
        })
}

/// Borrow the shared HTTP client.
pub fn get_shared_http_client() -> &'static reqwest::Client {
    &SHARED_HTTP_CLIENT
}

/// Convert our messages into the shape expected by `openai_rust`.
pub fn to_chat_messages(messages: &[Message]) -> Vec<chat::Message> {
    let mut formatted = Vec::with_capacity(messages.len());
    for msg in messages {
        formatted.push(chat::Message {
            role: msg.role.as_str().to_owned(),
            content: msg.content.to_string(),
        });
    }
    formatted
}

/// Send a chat request and return the assistant's content together with its usage.
pub async fn send_and_track(
    api: &openai_rust::Client,
    model: &str,
    formatted_msgs: Vec<chat::Message>,
    url_path: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
) -> Result<(String, TokenUsage), ClientError> {
    let mut chat_arguments = chat::ChatArguments::new(model, formatted_msgs);
    chat_arguments.temperature = Some(temperature);
    chat_arguments.max_tokens = max_tokens;

    match api.create_chat(chat_arguments, url_path).await {
        Ok(response) => {
            let usage = TokenUsage {
                input_tokens: response.usage.prompt_tokens as usize,
                output_tokens: response.usage.completion_tokens as usize,
                total_tokens: response.usage.total_tokens as usize,
            };
            let content = response
                .choices
                .first()
                .map(|choice| choice.message.content.clone())
                .ok_or_else(|| ClientError::Decode("response contained no choices".into()))?;
            Ok((content, usage))
        }
        Err(err) => {
            log::error!(
                "roundtable::clients::common::send_and_track(...): OpenAI API Error: {}",
                err
            );
            Err(ClientError::Http(err.to_string()))
        }
    }
}
