//! In-memory emulation of the OnlineMQ REST service.
//!
//! This transport answers requests itself instead of sending them anywhere. It
//! implements the same resources, status codes and XML documents as the real
//! service, including transactional sends and receives, so connection code can
//! be exercised without network access.
//!
//! Emulated behaviour:
//! - sends outside a transaction are visible immediately; inside a transaction
//!   they are staged until commit and discarded on rollback
//! - receives inside a transaction hide the message until commit (deleted) or
//!   rollback (restored to the head of the queue in original order)
//! - a transaction is removed by its commit or rollback and only usable by the
//!   user that opened it
//! - message ids are assigned sequentially; a missing sender is set to the user
//!
//! Hidden messages are not released by the visibility timeout; they stay hidden
//! until their transaction ends.

use super::{Method, Transport, TransportRequest, TransportResponse};
use crate::auth::Credentials;
use crate::codec;
use crate::error::{OmqError, ServerErrorKind};
use crate::message::{MessageId, QueueId, QueueManagerId, ReceivedMessage, TransactionId};
use crate::queue::Queue;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

const XML_CONTENT_TYPE: &str = "application/xml";

// ============================================================================
// Queue definitions
// ============================================================================

/// Definition of a queue hosted by an [`InMemoryServer`].
///
/// Sending and receiving are enabled and no limits apply unless configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDefinition {
    id: QueueId,
    name: String,
    queue_manager_id: QueueManagerId,
    max_depth: Option<u64>,
    max_message_length: Option<u64>,
    send_enabled: bool,
    receive_enabled: bool,
    description: Option<String>,
    visibility_timeout: Option<Duration>,
}

impl QueueDefinition {
    pub fn new(id: QueueId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            queue_manager_id: QueueManagerId::new(1),
            max_depth: None,
            max_message_length: None,
            send_enabled: true,
            receive_enabled: true,
            description: None,
            visibility_timeout: None,
        }
    }

    pub fn with_queue_manager(mut self, queue_manager_id: QueueManagerId) -> Self {
        self.queue_manager_id = queue_manager_id;
        self
    }

    /// Limit the number of messages the queue holds
    pub fn with_max_depth(mut self, max_depth: u64) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Limit the body length in bytes
    pub fn with_max_message_length(mut self, max_message_length: u64) -> Self {
        self.max_message_length = Some(max_message_length);
        self
    }

    pub fn with_send_enabled(mut self, enabled: bool) -> Self {
        self.send_enabled = enabled;
        self
    }

    pub fn with_receive_enabled(mut self, enabled: bool) -> Self {
        self.receive_enabled = enabled;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = Some(timeout);
        self
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    fn describe(&self, depth: u64) -> Queue {
        Queue {
            id: self.id,
            name: self.name.clone(),
            queue_manager_id: self.queue_manager_id,
            max_depth: self.max_depth,
            max_message_length: self.max_message_length,
            send_enabled: self.send_enabled,
            receive_enabled: self.receive_enabled,
            description: self.description.clone(),
            depth,
            visibility_timeout: self.visibility_timeout,
        }
    }
}

// ============================================================================
// Internal Storage Structures
// ============================================================================

struct StoredQueue {
    definition: QueueDefinition,
    /// Visible messages in FIFO order
    messages: VecDeque<ReceivedMessage>,
}

struct PendingTransaction {
    owner: String,
    /// Sends staged until commit
    sends: Vec<ReceivedMessage>,
    /// Received messages hidden until commit or rollback, in receive order
    receives: Vec<ReceivedMessage>,
}

struct ServerState {
    queues: HashMap<QueueId, StoredQueue>,
    transactions: HashMap<TransactionId, PendingTransaction>,
    users: Vec<Credentials>,
    next_message_id: u64,
    next_transaction_id: u64,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            queues: HashMap::new(),
            transactions: HashMap::new(),
            users: Vec::new(),
            next_message_id: 1,
            next_transaction_id: 1,
        }
    }
}

/// Error reply produced while handling a request
#[derive(Debug)]
struct Rejection {
    status: u16,
    kind: ServerErrorKind,
    message: String,
}

impl Rejection {
    fn new(status: u16, kind: ServerErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    fn queue_not_found(queue_id: impl std::fmt::Display) -> Self {
        Self::new(
            404,
            ServerErrorKind::QueueNotFound,
            format!("Queue {} not found", queue_id),
        )
    }

    fn transaction_not_found(transaction_id: impl std::fmt::Display) -> Self {
        Self::new(
            404,
            ServerErrorKind::TransactionNotFound,
            format!("Transaction {} not found", transaction_id),
        )
    }

    fn into_response(self) -> TransportResponse {
        xml_response(self.status, codec::encode_error(self.kind, &self.message))
    }
}

fn xml_response(status: u16, body: String) -> TransportResponse {
    TransportResponse::new(status, body).with_header("Content-Type", XML_CONTENT_TYPE)
}

impl ServerState {
    fn handle(
        &mut self,
        request: &TransportRequest,
        credentials: &Credentials,
    ) -> Result<TransportResponse, Rejection> {
        self.authenticate(credentials)?;
        let user = credentials.user();

        let path = request.path.trim_matches('/');
        let path = path.strip_suffix(".xml").unwrap_or(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["transactions"]) => Ok(self.open_transaction(user)),
            (Method::Post, ["transactions", id, "commit"]) => {
                let transaction_id = parse_transaction_id(id)?;
                self.commit(transaction_id, user)
            }
            (Method::Post, ["transactions", id, "rollback"]) => {
                let transaction_id = parse_transaction_id(id)?;
                self.rollback(transaction_id, user)
            }
            (Method::Post, ["queues", id, "messages"]) => {
                let queue_id = parse_queue_id(id)?;
                let transaction_id = self.transaction_param(request, user)?;
                self.send(queue_id, request.body.as_deref(), transaction_id, user)
            }
            (Method::Post, ["queues", id, "messages", "receive"]) => {
                let queue_id = parse_queue_id(id)?;
                let transaction_id = self.transaction_param(request, user)?;
                self.receive(queue_id, transaction_id)
            }
            (Method::Get, ["queues", id]) => {
                let queue_id = parse_queue_id(id)?;
                self.describe_queue(queue_id)
            }
            _ => Err(Rejection::new(
                404,
                ServerErrorKind::Other,
                format!("No resource for {} {}", request.method, request.path),
            )),
        }
    }

    fn authenticate(&self, credentials: &Credentials) -> Result<(), Rejection> {
        if self.users.is_empty()
            || self
                .users
                .iter()
                .any(|u| u.authorization_header() == credentials.authorization_header())
        {
            return Ok(());
        }

        Err(Rejection::new(
            401,
            ServerErrorKind::Unauthorized,
            "Invalid user name or password",
        ))
    }

    /// Resolve the optional `transaction_id` query parameter
    fn transaction_param(
        &self,
        request: &TransportRequest,
        user: &str,
    ) -> Result<Option<TransactionId>, Rejection> {
        let Some(raw) = request.query_param("transaction_id") else {
            return Ok(None);
        };

        let transaction_id = parse_transaction_id(raw)?;
        match self.transactions.get(&transaction_id) {
            Some(pending) if pending.owner == user => Ok(Some(transaction_id)),
            _ => Err(Rejection::transaction_not_found(transaction_id)),
        }
    }

    fn open_transaction(&mut self, user: &str) -> TransportResponse {
        let transaction_id = TransactionId::new(self.next_transaction_id);
        self.next_transaction_id += 1;

        self.transactions.insert(
            transaction_id,
            PendingTransaction {
                owner: user.to_string(),
                sends: Vec::new(),
                receives: Vec::new(),
            },
        );

        xml_response(201, codec::encode_transaction(transaction_id))
            .with_header("Location", format!("/transactions/{}", transaction_id))
    }

    /// Remove a transaction owned by `user`
    fn take_transaction(
        &mut self,
        transaction_id: TransactionId,
        user: &str,
    ) -> Result<PendingTransaction, Rejection> {
        match self.transactions.get(&transaction_id) {
            Some(pending) if pending.owner == user => {}
            _ => return Err(Rejection::transaction_not_found(transaction_id)),
        }

        self.transactions
            .remove(&transaction_id)
            .ok_or_else(|| Rejection::transaction_not_found(transaction_id))
    }

    fn commit(
        &mut self,
        transaction_id: TransactionId,
        user: &str,
    ) -> Result<TransportResponse, Rejection> {
        let pending = self.take_transaction(transaction_id, user)?;

        for message in pending.sends {
            if let Some(queue) = self.queues.get_mut(&message.queue_id()) {
                queue.messages.push_back(message);
            }
        }
        // Received messages are consumed by the commit

        Ok(xml_response(200, codec::encode_transaction(transaction_id)))
    }

    fn rollback(
        &mut self,
        transaction_id: TransactionId,
        user: &str,
    ) -> Result<TransportResponse, Rejection> {
        let pending = self.take_transaction(transaction_id, user)?;

        for message in pending.receives.into_iter().rev() {
            if let Some(queue) = self.queues.get_mut(&message.queue_id()) {
                queue.messages.push_front(message);
            }
        }

        Ok(xml_response(200, codec::encode_transaction(transaction_id)))
    }

    fn send(
        &mut self,
        queue_id: QueueId,
        body: Option<&str>,
        transaction_id: Option<TransactionId>,
        user: &str,
    ) -> Result<TransportResponse, Rejection> {
        let (definition, visible) = match self.queues.get(&queue_id) {
            Some(queue) => (queue.definition.clone(), queue.messages.len() as u64),
            None => return Err(Rejection::queue_not_found(queue_id)),
        };

        if !definition.send_enabled {
            return Err(Rejection::new(
                403,
                ServerErrorKind::SendDisabled,
                format!("Send is disabled for queue {}", queue_id),
            ));
        }

        let body = body.ok_or_else(|| {
            Rejection::new(400, ServerErrorKind::Other, "Message document is required")
        })?;
        let mut message = codec::decode_message(body).map_err(|e| {
            Rejection::new(400, ServerErrorKind::Other, format!("Invalid message: {}", e))
        })?;

        if let Some(limit) = definition.max_message_length {
            if message.body().len() as u64 > limit {
                return Err(Rejection::new(
                    413,
                    ServerErrorKind::MessageTooLarge,
                    format!("Message body exceeds {} bytes", limit),
                ));
            }
        }

        if let Some(max_depth) = definition.max_depth {
            let staged = self
                .transactions
                .values()
                .flat_map(|t| t.sends.iter())
                .filter(|m| m.queue_id() == queue_id)
                .count() as u64;
            if visible + staged >= max_depth {
                return Err(Rejection::new(
                    409,
                    ServerErrorKind::QueueFull,
                    format!("Queue {} is full", queue_id),
                ));
            }
        }

        if message.sender().is_none() {
            message = message.with_sender(user);
        }

        let stored = ReceivedMessage::new(MessageId::new(self.next_message_id), queue_id, message);
        let reply = codec::encode_received_message(&stored).map_err(|e| {
            Rejection::new(500, ServerErrorKind::Other, format!("Failed to store message: {}", e))
        })?;
        self.next_message_id += 1;

        match transaction_id.and_then(|id| self.transactions.get_mut(&id)) {
            Some(pending) => pending.sends.push(stored),
            None => {
                if let Some(queue) = self.queues.get_mut(&queue_id) {
                    queue.messages.push_back(stored);
                }
            }
        }

        Ok(xml_response(201, reply))
    }

    fn receive(
        &mut self,
        queue_id: QueueId,
        transaction_id: Option<TransactionId>,
    ) -> Result<TransportResponse, Rejection> {
        let queue = self
            .queues
            .get_mut(&queue_id)
            .ok_or_else(|| Rejection::queue_not_found(queue_id))?;

        if !queue.definition.receive_enabled {
            return Err(Rejection::new(
                403,
                ServerErrorKind::ReceiveDisabled,
                format!("Receive is disabled for queue {}", queue_id),
            ));
        }

        let message = queue.messages.pop_front().ok_or_else(|| {
            Rejection::new(
                404,
                ServerErrorKind::QueueEmpty,
                format!("Queue {} is empty", queue_id),
            )
        })?;

        let reply = match codec::encode_received_message(&message) {
            Ok(reply) => reply,
            Err(e) => {
                queue.messages.push_front(message);
                return Err(Rejection::new(
                    500,
                    ServerErrorKind::Other,
                    format!("Failed to deliver message: {}", e),
                ));
            }
        };

        if let Some(pending) = transaction_id.and_then(|id| self.transactions.get_mut(&id)) {
            pending.receives.push(message);
        }

        Ok(xml_response(200, reply))
    }

    fn describe_queue(&self, queue_id: QueueId) -> Result<TransportResponse, Rejection> {
        let queue = self
            .queues
            .get(&queue_id)
            .ok_or_else(|| Rejection::queue_not_found(queue_id))?;

        let description = queue.definition.describe(queue.messages.len() as u64);
        Ok(xml_response(200, codec::encode_queue(&description)))
    }
}

fn parse_queue_id(raw: &str) -> Result<QueueId, Rejection> {
    raw.parse().map_err(|_| Rejection::queue_not_found(raw))
}

fn parse_transaction_id(raw: &str) -> Result<TransactionId, Rejection> {
    raw.parse()
        .map_err(|_| Rejection::transaction_not_found(raw))
}

// ============================================================================
// InMemoryServer
// ============================================================================

/// In-process OnlineMQ service usable as a [`Transport`].
///
/// Clones share the same state, so a test can keep a handle for seeding and
/// inspection while a connection owns another.
///
/// # Examples
///
/// ```
/// use onlinemq::{InMemoryServer, QueueDefinition, QueueId};
///
/// let server = InMemoryServer::new()
///     .with_queue(QueueDefinition::new(QueueId::new(30), "orders").with_max_depth(100));
/// assert_eq!(server.depth(QueueId::new(30)), Some(0));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryServer {
    state: Arc<RwLock<ServerState>>,
}

impl InMemoryServer {
    /// Create a server with no queues that accepts any credentials
    pub fn new() -> Self {
        Self::default()
    }

    /// Host a queue, replacing any queue with the same id
    pub fn with_queue(self, definition: QueueDefinition) -> Self {
        self.add_queue(definition);
        self
    }

    /// Accept these credentials; once any user is registered, others get `401`
    pub fn with_user(self, credentials: Credentials) -> Self {
        self.state_mut().users.push(credentials);
        self
    }

    pub fn add_queue(&self, definition: QueueDefinition) {
        self.state_mut().queues.insert(
            definition.id(),
            StoredQueue {
                definition,
                messages: VecDeque::new(),
            },
        );
    }

    /// Number of visible messages on a queue, `None` if the queue is unknown
    pub fn depth(&self, queue_id: QueueId) -> Option<u64> {
        self.state_read(|state| {
            state
                .queues
                .get(&queue_id)
                .map(|q| q.messages.len() as u64)
        })
    }

    /// Number of transactions opened and not yet committed or rolled back
    pub fn open_transactions(&self) -> usize {
        self.state_read(|state| state.transactions.len())
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, ServerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_read<T>(&self, f: impl FnOnce(&ServerState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn dispatch(&self, request: &TransportRequest, credentials: &Credentials) -> TransportResponse {
        self.state_mut()
            .handle(request, credentials)
            .unwrap_or_else(Rejection::into_response)
    }
}

impl std::fmt::Debug for InMemoryServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.state_read(|state| {
            f.debug_struct("InMemoryServer")
                .field("queues", &state.queues.len())
                .field("transactions", &state.transactions.len())
                .finish()
        })
    }
}

#[async_trait]
impl Transport for InMemoryServer {
    async fn execute(
        &self,
        request: TransportRequest,
        credentials: &Credentials,
    ) -> Result<TransportResponse, OmqError> {
        let response = self.dispatch(&request, credentials);

        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "In-memory server handled request"
        );

        Ok(response)
    }
}
