use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// A ClientWrapper is a wrapper around a specific completion service.
/// It provides a common interface the discussion loop and the analysis tool use to
/// generate text. It keeps no conversation state: every request carries the full
/// instruction payload assembled by the caller.
// src/roundtable/client_wrapper.rs

/// Represents the possible roles for a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    System, // persona and task rules for the speaking participant
    User,   // the assembled turn request
    Assistant,
}

impl Role {
    /// Wire name used by OpenAI-compatible endpoints.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Accumulate another usage record into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Represents a generic message to be sent to an LLM.
#[derive(Clone, Debug)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The actual content of the message.
    pub content: Arc<str>,
}

impl Message {
    pub fn system(content: impl AsRef<str>) -> Self {
        Message {
            role: Role::System,
            content: Arc::from(content.as_ref()),
        }
    }

    pub fn user(content: impl AsRef<str>) -> Self {
        Message {
            role: Role::User,
            content: Arc::from(content.as_ref()),
        }
    }
}

/// Everything a completion service needs to produce one utterance.
///
/// `temperature` is fixed per run; `tool_use` asks the service to expose its search tool,
/// and the service reports back in [`Completion::used_tool`] whether the tool was invoked.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    /// Name of the participant the reply is produced for, when there is one.
    pub speaker_name: Option<String>,
    pub temperature: f32,
    pub tool_use: bool,
    pub max_tokens: Option<u32>,
    /// Ask the service for a JSON object instead of prose.
    pub json_output: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        CompletionRequest {
            messages,
            speaker_name: None,
            temperature: 0.7,
            tool_use: false,
            max_tokens: None,
            json_output: false,
        }
    }

    pub fn with_speaker(mut self, name: impl Into<String>) -> Self {
        self.speaker_name = Some(name.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_tool_use(mut self, enabled: bool) -> Self {
        self.tool_use = enabled;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.json_output = enabled;
        self
    }
}

/// The text produced by a completion service plus what it reported about the call.
#[derive(Clone, Debug, Default)]
pub struct Completion {
    pub content: String,
    /// `true` when the service ran its search tool while producing `content`.
    pub used_tool: bool,
    pub usage: Option<TokenUsage>,
}

impl Completion {
    /// A plain text completion without tool use or usage accounting.
    pub fn text(content: impl Into<String>) -> Self {
        Completion {
            content: content.into(),
            used_tool: false,
            usage: None,
        }
    }
}

/// Errors surfaced by [`ClientWrapper`] implementations.
#[derive(Debug, Clone)]
pub enum ClientError {
    /// Transport failure (connection, TLS, timeout).
    Http(String),
    /// The service answered with a non-success status.
    Api { status: u16, message: String },
    /// The response body could not be decoded.
    Decode(String),
    /// No API key was configured.
    MissingCredentials(String),
    /// Every attempt allowed by the retry policy failed.
    RetryExceeded { attempts: usize, last_error: String },
}

impl ClientError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(_) | ClientError::Decode(_) => true,
            ClientError::Api { status, .. } => *status == 429 || *status >= 500,
            ClientError::MissingCredentials(_) | ClientError::RetryExceeded { .. } => false,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Http(msg) => write!(f, "HTTP error: {}", msg),
            ClientError::Api { status, message } => {
                write!(f, "API error (status {}): {}", status, message)
            }
            ClientError::Decode(msg) => write!(f, "Invalid response: {}", msg),
            ClientError::MissingCredentials(var) => {
                write!(f, "Missing credentials: {} is not set", var)
            }
            ClientError::RetryExceeded {
                attempts,
                last_error,
            } => write!(
                f,
                "Gave up after {} attempts, last error: {}",
                attempts, last_error
            ),
        }
    }
}

impl Error for ClientError {}

/// Trait defining the interface to interact with completion services.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Model identifier, used as the model label in run metadata.
    fn model_name(&self) -> &str;

    /// Produce one completion for the given request.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ClientError>;
}
