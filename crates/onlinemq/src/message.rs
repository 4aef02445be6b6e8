//! Message types for queue operations including core domain identifiers.

use crate::error::ValidationError;
use bytes::Bytes;
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::Required {
                        field: $field.to_string(),
                    });
                }

                trimmed
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|e| ValidationError::InvalidFormat {
                        field: $field.to_string(),
                        message: e.to_string(),
                    })
            }
        }
    };
}

numeric_id!(
    /// Server-assigned identifier of a queue
    QueueId,
    "queue_id"
);

numeric_id!(
    /// Server-assigned identifier of a message, present only on received messages
    MessageId,
    "message_id"
);

numeric_id!(
    /// Opaque token scoping sends and receives for atomic commit or rollback.
    ///
    /// The server is the only authority on whether a token is still valid.
    TransactionId,
    "transaction_id"
);

numeric_id!(
    /// Identifier of the queue manager that owns a queue
    QueueManagerId,
    "queue_manager_id"
);

// ============================================================================
// Message Attributes
// ============================================================================

/// Message priority, bounded to 1..=9
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const MIN: Priority = Priority(1);
    pub const MAX: Priority = Priority(9);
    /// Baseline priority used when none is given
    pub const DEFAULT: Priority = Priority(5);

    /// Create priority with range validation
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if !(Self::MIN.0..=Self::MAX.0).contains(&value) {
            return Err(ValidationError::OutOfRange {
                field: "priority".to_string(),
                message: format!("must be {}-{}, got {}", Self::MIN.0, Self::MAX.0, value),
            });
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the message body is represented on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BodyEncoding {
    /// UTF-8 text, XML-escaped in the document
    #[default]
    Utf8,
    /// UTF-8 text carried in a CDATA section
    Cdata,
    /// XML content carried as escaped text
    XmlEscaped,
    /// Arbitrary bytes, base64-encoded
    Base64,
}

impl BodyEncoding {
    /// Numeric id used by the service
    pub fn id(&self) -> u8 {
        match self {
            Self::Utf8 => 1,
            Self::Cdata => 2,
            Self::XmlEscaped => 3,
            Self::Base64 => 4,
        }
    }

    /// Check if the body must be valid UTF-8 text for this encoding
    pub fn is_textual(&self) -> bool {
        !matches!(self, Self::Base64)
    }
}

impl TryFrom<u64> for BodyEncoding {
    type Error = ValidationError;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Self::Utf8),
            2 => Ok(Self::Cdata),
            3 => Ok(Self::XmlEscaped),
            4 => Ok(Self::Base64),
            other => Err(ValidationError::OutOfRange {
                field: "body_encoding_id".to_string(),
                message: format!("unknown encoding id {}", other),
            }),
        }
    }
}

/// Declared format of the message body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BodyType {
    Xml,
    Yaml,
    Json,
    Sdl,
    Csv,
    /// Plain text or any format without a dedicated id
    #[default]
    Other,
}

impl BodyType {
    /// Numeric id used by the service
    pub fn id(&self) -> u8 {
        match self {
            Self::Xml => 1,
            Self::Yaml => 2,
            Self::Json => 3,
            Self::Sdl => 4,
            Self::Csv => 5,
            Self::Other => 6,
        }
    }
}

impl TryFrom<u64> for BodyType {
    type Error = ValidationError;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Self::Xml),
            2 => Ok(Self::Yaml),
            3 => Ok(Self::Json),
            4 => Ok(Self::Sdl),
            5 => Ok(Self::Csv),
            6 => Ok(Self::Other),
            other => Err(ValidationError::OutOfRange {
                field: "body_type_id".to_string(),
                message: format!("unknown body type id {}", other),
            }),
        }
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A message to be sent to a queue.
///
/// Outbound messages carry no queue id or message id; those are assigned by the
/// server and only exist on [`ReceivedMessage`].
///
/// # Examples
///
/// ```
/// use onlinemq::{BodyEncoding, BodyType, Message, Priority};
///
/// let message = Message::new("this is the message body!")
///     .with_body_type(BodyType::Json)
///     .with_description("greeting");
///
/// assert_eq!(message.encoding(), BodyEncoding::Utf8);
/// assert_eq!(message.priority(), Priority::DEFAULT);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    body: Bytes,
    encoding: BodyEncoding,
    body_type: BodyType,
    priority: Priority,
    description: Option<String>,
    sender: Option<String>,
}

impl Message {
    /// Create new message with body and default attributes
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            encoding: BodyEncoding::default(),
            body_type: BodyType::default(),
            priority: Priority::default(),
            description: None,
            sender: None,
        }
    }

    pub fn with_encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_body_type(mut self, body_type: BodyType) -> Self {
        self.body_type = body_type;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get body as text, if it is valid UTF-8
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn encoding(&self) -> BodyEncoding {
        self.encoding
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }
}

/// A message retrieved from a queue, with its server-assigned identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    id: MessageId,
    queue_id: QueueId,
    content: Message,
}

impl ReceivedMessage {
    pub(crate) fn new(id: MessageId, queue_id: QueueId, content: Message) -> Self {
        Self {
            id,
            queue_id,
            content,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn queue_id(&self) -> QueueId {
        self.queue_id
    }

    /// Content fields as an outbound message (for forwarding/replaying)
    pub fn message(&self) -> &Message {
        &self.content
    }

    /// Convert into the outbound message, dropping the server identifiers
    pub fn into_message(self) -> Message {
        self.content
    }

    pub fn body(&self) -> &Bytes {
        self.content.body()
    }

    pub fn body_text(&self) -> Option<&str> {
        self.content.body_text()
    }

    pub fn encoding(&self) -> BodyEncoding {
        self.content.encoding()
    }

    pub fn body_type(&self) -> BodyType {
        self.content.body_type()
    }

    pub fn priority(&self) -> Priority {
        self.content.priority()
    }

    pub fn description(&self) -> Option<&str> {
        self.content.description()
    }

    pub fn sender(&self) -> Option<&str> {
        self.content.sender()
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
