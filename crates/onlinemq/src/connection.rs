//! Authenticated connection to an OnlineMQ service.
//!
//! [`OmqConnection`] turns each operation into exactly one transport request
//! and maps the reply into a value or a classified [`OmqError`]. It holds no
//! mutable state: transactions are plain [`TransactionId`] tokens threaded
//! through calls, so one connection can interleave independent transactions
//! and clones can be used from many tasks at once.
//!
//! Reply handling is the same for every operation:
//! - a status of 400 or above is a server failure, parsed from the error body
//! - a success status other than the expected one is a local failure
//! - a success body that cannot be parsed into the expected document is a
//!   local failure

use crate::auth::Credentials;
use crate::codec;
use crate::config::ClientConfig;
use crate::error::{LocalError, OmqError, SerializationError, ServerError, ServerErrorKind};
use crate::message::{Message, QueueId, ReceivedMessage, TransactionId};
use crate::queue::Queue;
use crate::transport::{HttpsTransport, Method, Transport, TransportRequest, TransportResponse};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;

/// Expected success status of an operation
#[derive(Debug, Clone, Copy)]
enum Expect {
    Status(u16),
    AnySuccess,
}

impl Expect {
    fn accepts(&self, response: &TransportResponse) -> bool {
        match self {
            Self::Status(expected) => response.status == *expected,
            Self::AnySuccess => response.is_success(),
        }
    }
}

/// A connection to OnlineMQ authenticated with one set of credentials.
///
/// # Examples
///
/// ```no_run
/// use onlinemq::{Message, OmqConnection, QueueId};
///
/// # async fn example() -> Result<(), onlinemq::OmqError> {
/// let connection = OmqConnection::new("myuser@mail.com", "mypass")?;
/// let queue = QueueId::new(30);
///
/// let transaction = connection.open_transaction().await?;
/// connection
///     .send_message(queue, &Message::new("hello"), Some(transaction))
///     .await?;
/// connection.commit(transaction).await?;
///
/// while let Some(message) = connection.try_receive_message(queue, None).await? {
///     println!("{:?}", message.body_text());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct OmqConnection {
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl OmqConnection {
    /// Connect to the default OnlineMQ endpoint over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns a local error if the user name is invalid or the HTTP client
    /// cannot be created.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Result<Self, OmqError> {
        let credentials = Credentials::new(user, password)?;
        Self::builder(credentials).build()
    }

    /// Create a builder for a connection using `credentials`.
    pub fn builder(credentials: Credentials) -> OmqConnectionBuilder {
        OmqConnectionBuilder::new(credentials)
    }

    pub fn user(&self) -> &str {
        self.credentials.user()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open a server-side transaction.
    ///
    /// The returned token scopes later sends and receives; it is consumed by
    /// exactly one [`commit`](Self::commit) or [`rollback`](Self::rollback).
    #[instrument(skip(self), fields(user = %self.credentials.user()))]
    pub async fn open_transaction(&self) -> Result<TransactionId, OmqError> {
        const OPERATION: &str = "open_transaction";

        let request = TransportRequest::new(Method::Post, self.resource("/transactions"));
        let response = self.execute(OPERATION, request, Expect::AnySuccess).await?;

        let transaction_id =
            codec::decode_transaction_id(response.header("location"), &response.body)
                .map_err(|e| malformed(OPERATION, e))?;

        debug!(transaction_id = %transaction_id, "Opened transaction");
        Ok(transaction_id)
    }

    /// Commit a transaction, making its sends visible and its receives final.
    #[instrument(skip(self), fields(user = %self.credentials.user()))]
    pub async fn commit(&self, transaction_id: TransactionId) -> Result<(), OmqError> {
        let path = self.resource(&format!("/transactions/{}/commit", transaction_id));
        let request = TransportRequest::new(Method::Post, path);
        self.execute("commit", request, Expect::Status(200)).await?;

        debug!(transaction_id = %transaction_id, "Committed transaction");
        Ok(())
    }

    /// Roll back a transaction, discarding its sends and restoring its receives.
    #[instrument(skip(self), fields(user = %self.credentials.user()))]
    pub async fn rollback(&self, transaction_id: TransactionId) -> Result<(), OmqError> {
        let path = self.resource(&format!("/transactions/{}/rollback", transaction_id));
        let request = TransportRequest::new(Method::Post, path);
        self.execute("rollback", request, Expect::Status(200)).await?;

        debug!(transaction_id = %transaction_id, "Rolled back transaction");
        Ok(())
    }

    /// Send a message to a queue, optionally as part of a transaction.
    ///
    /// # Errors
    ///
    /// A body that cannot be represented in its declared encoding is rejected
    /// locally before anything is sent.
    #[instrument(
        skip(self, message),
        fields(user = %self.credentials.user(), body_len = message.body().len())
    )]
    pub async fn send_message(
        &self,
        queue_id: QueueId,
        message: &Message,
        transaction_id: Option<TransactionId>,
    ) -> Result<(), OmqError> {
        let body = codec::encode_message(message).map_err(LocalError::InvalidMessage)?;

        let path = self.resource(&format!("/queues/{}/messages", queue_id));
        let request = with_transaction(TransportRequest::new(Method::Post, path), transaction_id)
            .with_body(body);
        self.execute("send_message", request, Expect::Status(201)).await?;

        debug!(queue_id = %queue_id, "Sent message");
        Ok(())
    }

    /// Dequeue the next message from a queue.
    ///
    /// An empty queue fails with a server error whose kind is
    /// [`ServerErrorKind::QueueEmpty`]; see [`OmqError::is_queue_empty`] or use
    /// [`try_receive_message`](Self::try_receive_message) for polling.
    #[instrument(skip(self), fields(user = %self.credentials.user()))]
    pub async fn receive_message(
        &self,
        queue_id: QueueId,
        transaction_id: Option<TransactionId>,
    ) -> Result<ReceivedMessage, OmqError> {
        const OPERATION: &str = "receive_message";

        let path = self.resource(&format!("/queues/{}/messages/receive", queue_id));
        let request = with_transaction(TransportRequest::new(Method::Post, path), transaction_id);
        let response = self.execute(OPERATION, request, Expect::AnySuccess).await?;

        if response.status == 204 {
            debug!(queue_id = %queue_id, "Queue is empty");
            return Err(ServerError::with_kind(
                response.status,
                ServerErrorKind::QueueEmpty,
                format!("Queue {} is empty", queue_id),
            )
            .into());
        }

        let message = codec::decode_received_message(&response.body)
            .map_err(|e| malformed(OPERATION, e))?;

        debug!(queue_id = %queue_id, message_id = %message.id(), "Received message");
        Ok(message)
    }

    /// Dequeue the next message, returning `None` if the queue is empty.
    pub async fn try_receive_message(
        &self,
        queue_id: QueueId,
        transaction_id: Option<TransactionId>,
    ) -> Result<Option<ReceivedMessage>, OmqError> {
        match self.receive_message(queue_id, transaction_id).await {
            Ok(message) => Ok(Some(message)),
            Err(e) if e.is_queue_empty() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch the metadata of a queue.
    #[instrument(skip(self), fields(user = %self.credentials.user()))]
    pub async fn get_queue(&self, queue_id: QueueId) -> Result<Queue, OmqError> {
        const OPERATION: &str = "get_queue";

        let path = self.resource(&format!("/queues/{}", queue_id));
        let request = TransportRequest::new(Method::Get, path);
        let response = self.execute(OPERATION, request, Expect::AnySuccess).await?;

        let queue = codec::decode_queue(&response.body).map_err(|e| malformed(OPERATION, e))?;

        debug!(queue_id = %queue_id, depth = queue.depth(), "Fetched queue");
        Ok(queue)
    }

    /// Number of messages currently waiting on a queue (0 means empty).
    ///
    /// Fetches the full queue metadata and keeps only the depth.
    pub async fn get_queue_depth(&self, queue_id: QueueId) -> Result<u64, OmqError> {
        self.get_queue(queue_id).await.map(|queue| queue.depth())
    }

    fn resource(&self, path: &str) -> String {
        format!("{}{}", path, self.config.url_postfix)
    }

    /// Execute a request and classify the reply status
    async fn execute(
        &self,
        operation: &'static str,
        request: TransportRequest,
        expect: Expect,
    ) -> Result<TransportResponse, OmqError> {
        let response = self.transport.execute(request, &self.credentials).await?;

        if response.is_error() {
            let error = codec::decode_error(response.status, &response.body);
            if error.kind() == ServerErrorKind::QueueEmpty {
                debug!(operation, status = error.status(), "Queue is empty");
            } else {
                warn!(
                    operation,
                    status = error.status(),
                    kind = ?error.kind(),
                    message = %error.message(),
                    "Server rejected request"
                );
            }
            return Err(error.into());
        }

        if !expect.accepts(&response) {
            warn!(operation, status = response.status, "Unexpected response status");
            return Err(LocalError::UnexpectedStatus {
                operation,
                status: response.status,
            }
            .into());
        }

        Ok(response)
    }
}

impl fmt::Debug for OmqConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OmqConnection")
            .field("credentials", &self.credentials)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn with_transaction(
    request: TransportRequest,
    transaction_id: Option<TransactionId>,
) -> TransportRequest {
    match transaction_id {
        Some(id) => request.with_query("transaction_id", id),
        None => request,
    }
}

fn malformed(operation: &'static str, source: SerializationError) -> OmqError {
    warn!(operation, error = %source, "Malformed response");
    LocalError::MalformedResponse { operation, source }.into()
}

/// Builder for [`OmqConnection`].
pub struct OmqConnectionBuilder {
    credentials: Credentials,
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
}

impl OmqConnectionBuilder {
    fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            config: None,
            transport: None,
        }
    }

    /// Set the client configuration.
    ///
    /// If not set, uses `ClientConfig::default()`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom transport instead of HTTPS.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use a transport shared with other connections.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the connection.
    ///
    /// # Errors
    ///
    /// Returns a local error if the configuration is invalid or the HTTPS
    /// transport cannot be created.
    pub fn build(self) -> Result<OmqConnection, OmqError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpsTransport::new(&config)?),
        };

        Ok(OmqConnection {
            credentials: self.credentials,
            transport,
            config,
        })
    }
}

impl fmt::Debug for OmqConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OmqConnectionBuilder")
            .field("credentials", &self.credentials)
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}
