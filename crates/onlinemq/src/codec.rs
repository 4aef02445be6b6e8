//! Wire format for messages, queues, errors and transactions.
//!
//! Outbound message documents omit `id` and `queue_id`; inbound ones require
//! both. Body text depends on the message encoding:
//!
//! | encoding      | body element content          |
//! |---------------|-------------------------------|
//! | `Utf8`        | XML-escaped text              |
//! | `XmlEscaped`  | XML-escaped text              |
//! | `Cdata`       | CDATA section                 |
//! | `Base64`      | base64 of the raw body bytes  |

use crate::error::{SerializationError, ServerError, ServerErrorKind};
use crate::message::{
    BodyEncoding, BodyType, Message, MessageId, Priority, QueueId, QueueManagerId,
    ReceivedMessage, TransactionId,
};
use crate::queue::Queue;
use crate::xml::{check_xml_chars, ValueType, XmlBuilder, XmlDocument};
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use std::fmt::Display;
use std::time::Duration;

const MESSAGE_ROOT: &str = "message";
const QUEUE_ROOT: &str = "queue";
const TRANSACTION_ROOT: &str = "transaction";

/// Longest plain-text error body reported verbatim
const MAX_PLAIN_ERROR_LEN: usize = 512;

// ============================================================================
// Messages
// ============================================================================

/// Serialize an outbound message as sent to `POST /queues/{id}/messages`
pub(crate) fn encode_message(message: &Message) -> Result<String, SerializationError> {
    let mut builder = XmlBuilder::new(MESSAGE_ROOT);
    write_content(&mut builder, message)?;
    Ok(builder.finish())
}

/// Parse an outbound message document (the server side of a send)
pub(crate) fn decode_message(xml: &str) -> Result<Message, SerializationError> {
    let doc = XmlDocument::parse(xml)?;
    doc.expect_root(&[MESSAGE_ROOT])?;
    read_content(&doc)
}

/// Serialize a message as returned by a receive
pub(crate) fn encode_received_message(
    message: &ReceivedMessage,
) -> Result<String, SerializationError> {
    let mut builder = XmlBuilder::new(MESSAGE_ROOT);
    builder
        .typed("id", message.id(), ValueType::Integer)
        .typed("queue_id", message.queue_id(), ValueType::Integer);
    write_content(&mut builder, message.message())?;
    Ok(builder.finish())
}

/// Parse the reply of a receive; both identifiers are required
pub(crate) fn decode_received_message(xml: &str) -> Result<ReceivedMessage, SerializationError> {
    let doc = XmlDocument::parse(xml)?;
    doc.expect_root(&[MESSAGE_ROOT])?;

    let id = MessageId::new(doc.required_u64("id")?);
    let queue_id = QueueId::new(doc.required_u64("queue_id")?);
    let content = read_content(&doc)?;

    Ok(ReceivedMessage::new(id, queue_id, content))
}

fn write_content(builder: &mut XmlBuilder, message: &Message) -> Result<(), SerializationError> {
    let encoding = message.encoding();
    builder
        .typed("body_encoding_id", encoding.id(), ValueType::Integer)
        .typed("priority", message.priority().value(), ValueType::Integer)
        .typed("body_type_id", message.body_type().id(), ValueType::Integer)
        .optional_text("description", checked("description", message.description())?)
        .optional_text("sender", checked("sender", message.sender())?);

    if !encoding.is_textual() {
        builder.text("body", &general_purpose::STANDARD.encode(message.body()));
        return Ok(());
    }

    let text = body_as_text(message.body())?;
    if encoding == BodyEncoding::Cdata {
        if text.contains("]]>") {
            return Err(SerializationError::InvalidCdata);
        }
        builder.cdata("body", text);
    } else {
        builder.text("body", text);
    }

    Ok(())
}

fn read_content(doc: &XmlDocument) -> Result<Message, SerializationError> {
    let encoding_id = doc.required_u64("body_encoding_id")?;
    let encoding =
        BodyEncoding::try_from(encoding_id).map_err(|e| invalid("body_encoding_id", e))?;

    // Other clients omit unset metadata, so absent or nil values take defaults
    let body_type = match doc.optional_u64("body_type_id")? {
        Some(id) => BodyType::try_from(id).map_err(|e| invalid("body_type_id", e))?,
        None => BodyType::default(),
    };

    let priority = match doc.optional_u64("priority")? {
        Some(value) => u8::try_from(value)
            .map_err(|e| invalid("priority", e))
            .and_then(|value| Priority::new(value).map_err(|e| invalid("priority", e)))?,
        None => Priority::DEFAULT,
    };

    let body = read_body(doc, encoding)?;

    let mut message = Message::new(body)
        .with_encoding(encoding)
        .with_body_type(body_type)
        .with_priority(priority);
    if let Some(description) = doc.optional_string("description") {
        message = message.with_description(description);
    }
    if let Some(sender) = doc.optional_string("sender") {
        message = message.with_sender(sender);
    }

    Ok(message)
}

fn read_body(doc: &XmlDocument, encoding: BodyEncoding) -> Result<Bytes, SerializationError> {
    let text = doc
        .text("body")
        .ok_or_else(|| SerializationError::MissingField {
            field: "body".to_string(),
        })?;

    match encoding {
        BodyEncoding::Base64 => {
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            general_purpose::STANDARD
                .decode(compact)
                .map(Bytes::from)
                .map_err(|e| invalid("body", e))
        }
        _ => Ok(Bytes::from(text.to_string())),
    }
}

fn body_as_text(body: &Bytes) -> Result<&str, SerializationError> {
    let text = std::str::from_utf8(body).map_err(|_| SerializationError::InvalidUtf8 {
        field: "body".to_string(),
    })?;
    check_xml_chars("body", text)
}

fn checked<'a>(
    field: &str,
    text: Option<&'a str>,
) -> Result<Option<&'a str>, SerializationError> {
    text.map(|text| check_xml_chars(field, text)).transpose()
}

// ============================================================================
// Queues
// ============================================================================

/// Serialize queue metadata as returned by `GET /queues/{id}`
pub(crate) fn encode_queue(queue: &Queue) -> String {
    let mut builder = XmlBuilder::new(QUEUE_ROOT);
    builder
        .optional_text("description", queue.description())
        .typed("id", queue.id(), ValueType::Integer)
        .optional_typed("max_depth", queue.max_depth(), ValueType::Integer)
        .optional_typed(
            "max_message_length",
            queue.max_message_length(),
            ValueType::Integer,
        )
        .text("name", queue.name())
        .typed("queue_manager_id", queue.queue_manager_id(), ValueType::Integer)
        .typed("receive_enabled", queue.receive_enabled(), ValueType::Boolean)
        .typed("send_enabled", queue.send_enabled(), ValueType::Boolean)
        .optional_typed(
            "visibility_timeout",
            queue.visibility_timeout().map(|t| t.as_secs()),
            ValueType::Integer,
        )
        .typed("depth", queue.depth(), ValueType::Integer);
    builder.finish()
}

/// Parse queue metadata
pub(crate) fn decode_queue(xml: &str) -> Result<Queue, SerializationError> {
    let doc = XmlDocument::parse(xml)?;
    doc.expect_root(&[QUEUE_ROOT])?;

    Ok(Queue {
        id: QueueId::new(doc.required_u64("id")?),
        name: doc.required_string("name")?,
        queue_manager_id: QueueManagerId::new(doc.required_u64("queue_manager_id")?),
        max_depth: doc.optional_u64("max_depth")?,
        max_message_length: doc.optional_u64("max_message_length")?,
        send_enabled: doc.required_bool("send_enabled")?,
        receive_enabled: doc.required_bool("receive_enabled")?,
        description: doc.optional_string("description"),
        depth: doc.required_u64("depth")?,
        visibility_timeout: doc
            .optional_u64("visibility_timeout")?
            .map(Duration::from_secs),
    })
}

// ============================================================================
// Errors
// ============================================================================

/// Serialize an error reply
pub(crate) fn encode_error(kind: ServerErrorKind, message: &str) -> String {
    let mut builder = XmlBuilder::new("errors");
    builder.text_with_attributes("error", &[("code", kind.code())], message);
    builder.finish()
}

/// Build a server error from an error reply.
///
/// The status alone is the server's verdict, so this never fails: an empty
/// or unparseable body yields a generic message.
pub(crate) fn decode_error(status: u16, body: &str) -> ServerError {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return ServerError::new(status, None, ServerError::UNKNOWN_MESSAGE);
    }

    match XmlDocument::parse(trimmed) {
        Ok(doc) => {
            let message = doc
                .optional_string("error")
                .map(|m| m.trim().to_string())
                .unwrap_or_else(|| ServerError::UNKNOWN_MESSAGE.to_string());
            let code = doc.attribute("error", "code").map(|c| c.to_string());
            ServerError::new(status, code, message)
        }
        Err(_) if !trimmed.starts_with('<') && trimmed.len() <= MAX_PLAIN_ERROR_LEN => {
            ServerError::new(status, None, trimmed)
        }
        Err(_) => ServerError::new(status, None, ServerError::UNKNOWN_MESSAGE),
    }
}

// ============================================================================
// Transactions
// ============================================================================

/// Serialize the body of a transaction creation reply
pub(crate) fn encode_transaction(id: TransactionId) -> String {
    let mut builder = XmlBuilder::new(TRANSACTION_ROOT);
    builder.typed("id", id, ValueType::Integer);
    builder.finish()
}

/// Extract the id of a freshly opened transaction.
///
/// The service reports the new resource in the `Location` header
/// (`.../transactions/{id}`); a `<transaction><id>` body is accepted when the
/// header is absent.
pub(crate) fn decode_transaction_id(
    location: Option<&str>,
    body: &str,
) -> Result<TransactionId, SerializationError> {
    if let Some(location) = location {
        let path = location.split(&['?', '#'][..]).next().unwrap_or(location);
        let segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
        let segment = segment.strip_suffix(".xml").unwrap_or(segment);
        return segment
            .parse::<TransactionId>()
            .map_err(|e| invalid("location", e));
    }

    if body.trim().is_empty() {
        return Err(SerializationError::MissingField {
            field: "location".to_string(),
        });
    }

    let doc = XmlDocument::parse(body)?;
    doc.expect_root(&[TRANSACTION_ROOT])?;
    Ok(TransactionId::new(doc.required_u64("id")?))
}

fn invalid(field: &str, e: impl Display) -> SerializationError {
    SerializationError::InvalidField {
        field: field.to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
