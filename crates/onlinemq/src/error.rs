//! Error types for OnlineMQ operations.
//!
//! All failures share the single root [`OmqError`]. Its two variants separate
//! failures the client detected on its own ([`LocalError`]) from error replies
//! the server sent back ([`ServerError`]). Code that only cares that *something*
//! went wrong handles `OmqError`; code that needs to react to a specific server
//! condition (most commonly an empty queue on receive) inspects the server
//! variant through [`OmqError::as_server`] or [`OmqError::is_queue_empty`].

use thiserror::Error;

/// Discriminant of an [`OmqError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Detected by the client without a definitive server error reply.
    Local,
    /// Reported by the server with a status and message.
    Server,
}

/// Root error type for every OnlineMQ operation
#[derive(Debug, Error)]
pub enum OmqError {
    #[error(transparent)]
    Local(#[from] LocalError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

impl OmqError {
    /// Whether this failure was detected locally or reported by the server.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Local(_) => ErrorKind::Local,
            Self::Server(_) => ErrorKind::Server,
        }
    }

    /// Check if the server reported this failure
    pub fn is_server(&self) -> bool {
        self.kind() == ErrorKind::Server
    }

    /// Check if the client detected this failure on its own
    pub fn is_local(&self) -> bool {
        self.kind() == ErrorKind::Local
    }

    /// Get the server error, if the server reported this failure
    pub fn as_server(&self) -> Option<&ServerError> {
        match self {
            Self::Server(e) => Some(e),
            Self::Local(_) => None,
        }
    }

    /// Get the local error, if the client detected this failure
    pub fn as_local(&self) -> Option<&LocalError> {
        match self {
            Self::Local(e) => Some(e),
            Self::Server(_) => None,
        }
    }

    /// Check if this is the expected "nothing to dequeue" reply from a receive.
    pub fn is_queue_empty(&self) -> bool {
        self.as_server()
            .map(|e| e.kind() == ServerErrorKind::QueueEmpty)
            .unwrap_or(false)
    }

    /// HTTP status reported by the server, if any
    pub fn status(&self) -> Option<u16> {
        self.as_server().map(|e| e.status())
    }

    /// Check if error is transient and the operation may succeed if repeated.
    ///
    /// The client never retries on its own; this is a hint for callers that
    /// implement their own retry policy.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Local(e) => e.is_transient(),
            Self::Server(e) => e.is_transient(),
        }
    }
}

impl From<ConfigurationError> for OmqError {
    fn from(e: ConfigurationError) -> Self {
        Self::Local(LocalError::Configuration(e))
    }
}

impl From<ValidationError> for OmqError {
    fn from(e: ValidationError) -> Self {
        Self::Local(LocalError::Validation(e))
    }
}

/// Failures detected by the client itself
#[derive(Debug, Error)]
pub enum LocalError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timed out: {message}")]
    Timeout { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Message cannot be sent: {0}")]
    InvalidMessage(#[source] SerializationError),

    #[error("Malformed {operation} response: {source}")]
    MalformedResponse {
        operation: &'static str,
        source: SerializationError,
    },

    #[error("Unexpected HTTP status {status} for {operation}")]
    UnexpectedStatus { operation: &'static str, status: u16 },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl LocalError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => true,
            Self::Timeout { .. } => true,
            Self::Transport { .. } => true,
            Self::InvalidMessage(_) => false,
            Self::MalformedResponse { .. } => false,
            Self::UnexpectedStatus { .. } => false,
            Self::Configuration(_) => false,
            Self::Validation(_) => false,
        }
    }
}

/// Named server conditions callers commonly branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerErrorKind {
    /// Receive found nothing to dequeue.
    QueueEmpty,
    QueueNotFound,
    TransactionNotFound,
    SendDisabled,
    ReceiveDisabled,
    QueueFull,
    MessageTooLarge,
    Unauthorized,
    Other,
}

impl ServerErrorKind {
    /// Machine code used on the wire for this kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::QueueEmpty => "queue_empty",
            Self::QueueNotFound => "queue_not_found",
            Self::TransactionNotFound => "transaction_not_found",
            Self::SendDisabled => "send_disabled",
            Self::ReceiveDisabled => "receive_disabled",
            Self::QueueFull => "queue_full",
            Self::MessageTooLarge => "message_too_large",
            Self::Unauthorized => "unauthorized",
            Self::Other => "error",
        }
    }

    /// Classify a server reply.
    ///
    /// A machine code, when present and known, decides. Otherwise the message
    /// text is matched against the phrases the service uses, and finally the
    /// status code is consulted.
    pub fn classify(status: u16, code: Option<&str>, message: &str) -> Self {
        if let Some(kind) = code.and_then(Self::from_code) {
            return kind;
        }

        let text = message.to_ascii_lowercase();
        if describes_empty_queue(&text) {
            return Self::QueueEmpty;
        }
        if text.contains("transaction")
            && (text.contains("not found") || text.contains("invalid") || text.contains("expired"))
        {
            return Self::TransactionNotFound;
        }
        if text.contains("queue") && (text.contains("not found") || text.contains("does not exist"))
        {
            return Self::QueueNotFound;
        }
        if text.contains("send") && text.contains("disabled") {
            return Self::SendDisabled;
        }
        if text.contains("receive") && text.contains("disabled") {
            return Self::ReceiveDisabled;
        }

        match status {
            401 => Self::Unauthorized,
            413 => Self::MessageTooLarge,
            _ => Self::Other,
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        let kind = match code {
            "queue_empty" => Self::QueueEmpty,
            "queue_not_found" => Self::QueueNotFound,
            "transaction_not_found" => Self::TransactionNotFound,
            "send_disabled" => Self::SendDisabled,
            "receive_disabled" => Self::ReceiveDisabled,
            "queue_full" => Self::QueueFull,
            "message_too_large" => Self::MessageTooLarge,
            "unauthorized" => Self::Unauthorized,
            _ => return None,
        };
        Some(kind)
    }
}

/// Phrases the service uses when a receive finds nothing to dequeue
const QUEUE_EMPTY_PHRASES: &[&str] = &[
    "queue is empty",
    "queue empty",
    "no messages",
    "no message available",
];

fn describes_empty_queue(text: &str) -> bool {
    let negated = text.contains(" not ") || text.contains("n't");
    !negated && QUEUE_EMPTY_PHRASES.iter().any(|phrase| text.contains(phrase))
}

/// An error reply from the OnlineMQ server
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Server error ({status}): {message}")]
pub struct ServerError {
    status: u16,
    kind: ServerErrorKind,
    code: Option<String>,
    message: String,
}

impl ServerError {
    /// Fallback message when the reply names no error
    pub const UNKNOWN_MESSAGE: &'static str = "Unknown server error";

    /// Create a server error, classifying it from status, code and message.
    pub fn new(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = ServerErrorKind::classify(status, code.as_deref(), &message);
        Self {
            status,
            kind,
            code,
            message,
        }
    }

    /// Create a server error with an explicit kind
    pub fn with_kind(status: u16, kind: ServerErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            code: Some(kind.code().to_string()),
            message: message.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn kind(&self) -> ServerErrorKind {
        self.kind
    }

    /// Machine code sent by the server, if any
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Only 5xx replies and throttling are worth repeating.
    pub fn is_transient(&self) -> bool {
        self.status >= 500 || self.status == 429
    }
}

/// Errors while encoding or decoding wire documents
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    #[error("XML parsing failed: {message}")]
    Xml { message: String },

    #[error("Expected <{expected}> document, found <{found}>")]
    UnexpectedRoot { expected: String, found: String },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Field '{field}' has invalid value: {message}")]
    InvalidField { field: String, message: String },

    #[error("Field '{field}' is not valid UTF-8")]
    InvalidUtf8 { field: String },

    #[error("Field '{field}' contains U+{code_point:04X}, which XML cannot carry")]
    IllegalCharacter { field: String, code_point: u32 },

    #[error("Body contains ']]>' and cannot be sent as CDATA")]
    InvalidCdata,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
