//! # OnlineMQ
//!
//! Client library for the OnlineMQ hosted message queue REST service.
//!
//! This library provides:
//! - Transactions: open, commit and roll back server-side transactions
//! - Sending and receiving messages, optionally inside a transaction
//! - Queue metadata and depth lookups
//! - A local/server error taxonomy in which an empty queue is a distinguishable
//!   server condition
//! - An in-memory emulation of the service for tests and offline development
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all operations
//! - [`message`] - Identifiers, outbound and received messages
//! - [`queue`] - Queue metadata
//! - [`auth`] - Credentials and HTTP Basic authorization
//! - [`config`] - Client configuration and layered loading
//! - [`transport`] - Transport trait, HTTPS transport and in-memory server
//! - [`connection`] - The authenticated connection and its operations
//!
//! ## Example
//!
//! ```
//! use onlinemq::{Credentials, InMemoryServer, Message, OmqConnection, QueueDefinition, QueueId};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), onlinemq::OmqError> {
//! let queue = QueueId::new(30);
//! let server = InMemoryServer::new().with_queue(QueueDefinition::new(queue, "orders"));
//!
//! let connection = OmqConnection::builder(Credentials::new("myuser@mail.com", "mypass")?)
//!     .transport(server)
//!     .build()?;
//!
//! connection.send_message(queue, &Message::new("hello"), None).await?;
//! assert_eq!(connection.get_queue_depth(queue).await?, 1);
//!
//! let received = connection.receive_message(queue, None).await?;
//! assert_eq!(received.body_text(), Some("hello"));
//!
//! let error = connection.receive_message(queue, None).await.unwrap_err();
//! assert!(error.is_queue_empty());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod queue;
pub mod transport;

mod codec;
mod xml;

// Re-export commonly used types at crate root for convenience
pub use auth::Credentials;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use connection::{OmqConnection, OmqConnectionBuilder};
pub use error::{
    ConfigurationError, ErrorKind, LocalError, OmqError, SerializationError, ServerError,
    ServerErrorKind, ValidationError,
};
pub use message::{
    BodyEncoding, BodyType, Message, MessageId, Priority, QueueId, QueueManagerId,
    ReceivedMessage, TransactionId,
};
pub use queue::Queue;
pub use transport::{
    HttpsTransport, InMemoryServer, Method, QueueDefinition, Transport, TransportRequest,
    TransportResponse,
};
