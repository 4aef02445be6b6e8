//! Tests for the connection.

use super::*;
use crate::error::ErrorKind;
use crate::message::{BodyEncoding, MessageId};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

const QUEUE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<queue>
  <description>Incoming orders</description>
  <id type="integer">30</id>
  <max_depth type="integer">1000</max_depth>
  <max_message_length type="integer">65536</max_message_length>
  <name>orders</name>
  <queue_manager_id type="integer">7</queue_manager_id>
  <receive_enabled type="boolean">true</receive_enabled>
  <send_enabled type="boolean">true</send_enabled>
  <visibility_timeout type="integer">30</visibility_timeout>
  <depth type="integer">3</depth>
</queue>"#;

const MESSAGE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<message>
  <id type="integer">501</id>
  <queue_id type="integer">30</queue_id>
  <body_encoding_id type="integer">1</body_encoding_id>
  <priority type="integer">7</priority>
  <body_type_id type="integer">3</body_type_id>
  <sender>alice</sender>
  <body>{"order": 1}</body>
</message>"#;

/// Transport replaying scripted responses and recording every request
#[derive(Clone, Default)]
struct MockTransport {
    requests: Arc<Mutex<Vec<(TransportRequest, String)>>>,
    responses: Arc<Mutex<VecDeque<Option<TransportResponse>>>>,
}

impl MockTransport {
    fn respond(self, response: TransportResponse) -> Self {
        self.responses.lock().unwrap().push_back(Some(response));
        self
    }

    /// Script a transport failure (no reply at all)
    fn time_out(self) -> Self {
        self.responses.lock().unwrap().push_back(None);
        self
    }

    fn requests(&self) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    fn last_request(&self) -> TransportRequest {
        self.requests().pop().expect("no request recorded")
    }

    fn last_user(&self) -> String {
        self.requests.lock().unwrap().last().unwrap().1.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(
        &self,
        request: TransportRequest,
        credentials: &Credentials,
    ) -> Result<TransportResponse, OmqError> {
        self.requests
            .lock()
            .unwrap()
            .push((request, credentials.user().to_string()));

        match self.responses.lock().unwrap().pop_front() {
            Some(Some(response)) => Ok(response),
            Some(None) => Err(LocalError::Timeout {
                message: "scripted timeout".to_string(),
            }
            .into()),
            None => panic!("no scripted response left"),
        }
    }
}

fn connection(transport: &MockTransport) -> OmqConnection {
    OmqConnection::builder(Credentials::new("alice", "secret").unwrap())
        .transport(transport.clone())
        .build()
        .unwrap()
}

fn error_reply(status: u16, body: &str) -> TransportResponse {
    TransportResponse::new(status, body)
}

fn local_error(error: &OmqError) -> &LocalError {
    error.as_local().expect("expected a local error")
}

mod construction_tests {
    use super::*;

    #[test]
    fn test_new_uses_default_config() {
        let connection = OmqConnection::new("myuser@mail.com", "mypass").unwrap();

        assert_eq!(connection.user(), "myuser@mail.com");
        assert_eq!(connection.config(), &ClientConfig::default());
    }

    #[test]
    fn test_new_rejects_empty_user() {
        let error = OmqConnection::new("", "mypass").unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Local);
        assert!(matches!(local_error(&error), LocalError::Validation(_)));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = OmqConnection::builder(Credentials::new("alice", "secret").unwrap())
            .config(ClientConfig::default().with_base_url("nope"))
            .transport(MockTransport::default())
            .build();

        assert!(matches!(
            result.unwrap_err().as_local(),
            Some(LocalError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_hides_password() {
        let connection = OmqConnection::new("alice", "hunter2").unwrap();

        let output = format!("{:?}", connection);

        assert!(output.contains("alice"));
        assert!(!output.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_requests_carry_connection_credentials() {
        let transport = MockTransport::default().respond(TransportResponse::new(200, QUEUE_XML));

        connection(&transport).get_queue(QueueId::new(30)).await.unwrap();

        assert_eq!(transport.last_user(), "alice");
    }
}

mod transaction_tests {
    use super::*;

    #[tokio::test]
    async fn test_open_transaction_reads_location() {
        let transport = MockTransport::default().respond(
            TransportResponse::new(201, "").with_header("Location", "/transactions/17.xml"),
        );

        let transaction = connection(&transport).open_transaction().await.unwrap();

        assert_eq!(transaction, TransactionId::new(17));
        let request = transport.last_request();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "/transactions.xml");
        assert!(request.body.is_none());
    }

    #[tokio::test]
    async fn test_open_transaction_falls_back_to_body() {
        let transport = MockTransport::default().respond(TransportResponse::new(
            201,
            "<transaction><id type=\"integer\">9</id></transaction>",
        ));

        let transaction = connection(&transport).open_transaction().await.unwrap();

        assert_eq!(transaction, TransactionId::new(9));
    }

    #[tokio::test]
    async fn test_open_transaction_without_id_is_local_failure() {
        let transport = MockTransport::default().respond(TransportResponse::new(201, ""));

        let error = connection(&transport).open_transaction().await.unwrap_err();

        assert!(matches!(
            local_error(&error),
            LocalError::MalformedResponse {
                operation: "open_transaction",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_commit_and_rollback_paths() {
        let transport = MockTransport::default()
            .respond(TransportResponse::new(200, ""))
            .respond(TransportResponse::new(200, ""));
        let connection = connection(&transport);

        connection.commit(TransactionId::new(4)).await.unwrap();
        connection.rollback(TransactionId::new(5)).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].path, "/transactions/4/commit.xml");
        assert_eq!(requests[1].path, "/transactions/5/rollback.xml");
        assert!(requests.iter().all(|r| r.method == Method::Post));
    }

    #[tokio::test]
    async fn test_commit_unknown_transaction_is_server_failure() {
        let transport = MockTransport::default().respond(error_reply(
            404,
            "<errors><error>Transaction not found</error></errors>",
        ));

        let error = connection(&transport)
            .commit(TransactionId::new(4))
            .await
            .unwrap_err();

        let server = error.as_server().expect("expected a server error");
        assert_eq!(server.status(), 404);
        assert_eq!(server.kind(), ServerErrorKind::TransactionNotFound);
        assert_eq!(server.message(), "Transaction not found");
    }

    #[tokio::test]
    async fn test_commit_with_unexpected_success_status() {
        let transport = MockTransport::default().respond(TransportResponse::new(202, ""));

        let error = connection(&transport)
            .commit(TransactionId::new(4))
            .await
            .unwrap_err();

        assert!(matches!(
            local_error(&error),
            LocalError::UnexpectedStatus {
                operation: "commit",
                status: 202
            }
        ));
    }
}

mod send_tests {
    use super::*;

    #[tokio::test]
    async fn test_send_without_transaction() {
        let transport = MockTransport::default().respond(TransportResponse::new(201, ""));
        let message = Message::new("hello").with_description("greeting");

        connection(&transport)
            .send_message(QueueId::new(30), &message, None)
            .await
            .unwrap();

        let request = transport.last_request();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "/queues/30/messages.xml");
        assert!(request.query.is_empty());
        let body = request.body.unwrap();
        assert!(body.contains("<body>hello</body>"));
        assert!(body.contains("<description>greeting</description>"));
        assert!(!body.contains("<id"));
        assert!(!body.contains("<queue_id"));
    }

    #[tokio::test]
    async fn test_send_attaches_transaction() {
        let transport = MockTransport::default().respond(TransportResponse::new(201, ""));

        connection(&transport)
            .send_message(
                QueueId::new(30),
                &Message::new("hello"),
                Some(TransactionId::new(12)),
            )
            .await
            .unwrap();

        assert_eq!(
            transport.last_request().query_param("transaction_id"),
            Some("12")
        );
    }

    #[tokio::test]
    async fn test_send_requires_created_status() {
        let transport = MockTransport::default().respond(TransportResponse::new(200, ""));

        let error = connection(&transport)
            .send_message(QueueId::new(30), &Message::new("hello"), None)
            .await
            .unwrap_err();

        assert!(matches!(
            local_error(&error),
            LocalError::UnexpectedStatus { status: 200, .. }
        ));
    }

    #[tokio::test]
    async fn test_unencodable_message_is_rejected_before_sending() {
        let transport = MockTransport::default();
        let message = Message::new("a]]>b").with_encoding(BodyEncoding::Cdata);

        let error = connection(&transport)
            .send_message(QueueId::new(30), &message, None)
            .await
            .unwrap_err();

        assert!(matches!(local_error(&error), LocalError::InvalidMessage(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_send_disabled_is_server_failure() {
        let transport = MockTransport::default().respond(error_reply(
            403,
            "<errors><error code=\"send_disabled\">Send is disabled</error></errors>",
        ));

        let error = connection(&transport)
            .send_message(QueueId::new(30), &Message::new("hello"), None)
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Server);
        assert_eq!(
            error.as_server().map(|e| e.kind()),
            Some(ServerErrorKind::SendDisabled)
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_local() {
        let transport = MockTransport::default().time_out();

        let error = connection(&transport)
            .send_message(QueueId::new(30), &Message::new("hello"), None)
            .await
            .unwrap_err();

        assert!(matches!(local_error(&error), LocalError::Timeout { .. }));
        assert!(error.is_transient());
    }
}

mod receive_tests {
    use super::*;

    #[tokio::test]
    async fn test_receive_parses_message() {
        let transport = MockTransport::default().respond(TransportResponse::new(200, MESSAGE_XML));

        let message = connection(&transport)
            .receive_message(QueueId::new(30), Some(TransactionId::new(3)))
            .await
            .unwrap();

        assert_eq!(message.id(), MessageId::new(501));
        assert_eq!(message.queue_id(), QueueId::new(30));
        assert_eq!(message.body_text(), Some("{\"order\": 1}"));
        assert_eq!(message.priority().value(), 7);
        assert_eq!(message.sender(), Some("alice"));

        let request = transport.last_request();
        assert_eq!(request.path, "/queues/30/messages/receive.xml");
        assert_eq!(request.query_param("transaction_id"), Some("3"));
    }

    #[tokio::test]
    async fn test_empty_queue_is_distinguishable() {
        let transport = MockTransport::default().respond(error_reply(
            404,
            "<errors><error code=\"queue_empty\">Queue is empty</error></errors>",
        ));

        let error = connection(&transport)
            .receive_message(QueueId::new(30), None)
            .await
            .unwrap_err();

        assert!(error.is_queue_empty());
        assert_eq!(error.status(), Some(404));
    }

    #[tokio::test]
    async fn test_missing_queue_is_not_empty_queue() {
        let transport = MockTransport::default().respond(error_reply(
            404,
            "<errors><error>Queue not found</error></errors>",
        ));

        let error = connection(&transport)
            .receive_message(QueueId::new(99), None)
            .await
            .unwrap_err();

        assert!(!error.is_queue_empty());
        assert_eq!(
            error.as_server().map(|e| e.kind()),
            Some(ServerErrorKind::QueueNotFound)
        );
    }

    #[tokio::test]
    async fn test_no_content_means_empty_queue() {
        let transport = MockTransport::default().respond(TransportResponse::new(204, ""));

        let error = connection(&transport)
            .receive_message(QueueId::new(30), None)
            .await
            .unwrap_err();

        assert!(error.is_queue_empty());
    }

    #[tokio::test]
    async fn test_malformed_message_is_local_failure() {
        let body = MESSAGE_XML.replace("<queue_id type=\"integer\">30</queue_id>", "");
        let transport = MockTransport::default().respond(TransportResponse::new(200, body));

        let error = connection(&transport)
            .receive_message(QueueId::new(30), None)
            .await
            .unwrap_err();

        assert!(error.is_local());
        assert!(matches!(
            local_error(&error),
            LocalError::MalformedResponse {
                operation: "receive_message",
                source: SerializationError::MissingField { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_unparseable_error_body_is_still_server_failure() {
        let transport = MockTransport::default().respond(error_reply(500, "<html><body>"));

        let error = connection(&transport)
            .receive_message(QueueId::new(30), None)
            .await
            .unwrap_err();

        let server = error.as_server().expect("expected a server error");
        assert_eq!(server.status(), 500);
        assert_eq!(server.message(), ServerError::UNKNOWN_MESSAGE);
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn test_try_receive_returns_none_when_empty() {
        let transport = MockTransport::default()
            .respond(error_reply(
                404,
                "<errors><error code=\"queue_empty\">Queue is empty</error></errors>",
            ))
            .respond(TransportResponse::new(200, MESSAGE_XML));
        let connection = connection(&transport);

        let first = connection
            .try_receive_message(QueueId::new(30), None)
            .await
            .unwrap();
        let second = connection
            .try_receive_message(QueueId::new(30), None)
            .await
            .unwrap();

        assert!(first.is_none());
        assert_eq!(second.map(|m| m.id()), Some(MessageId::new(501)));
    }

    #[tokio::test]
    async fn test_try_receive_reports_uncoded_non_empty_failure() {
        let transport = MockTransport::default().respond(error_reply(
            409,
            "<errors><error>Queue is not empty</error></errors>",
        ));

        let error = connection(&transport)
            .try_receive_message(QueueId::new(30), None)
            .await
            .unwrap_err();

        assert!(!error.is_queue_empty());
        assert_eq!(error.status(), Some(409));
    }

    #[tokio::test]
    async fn test_try_receive_propagates_other_failures() {
        let transport = MockTransport::default().respond(error_reply(
            403,
            "<errors><error code=\"receive_disabled\">Receive is disabled</error></errors>",
        ));

        let result = connection(&transport)
            .try_receive_message(QueueId::new(30), None)
            .await;

        assert!(result.is_err());
    }
}

mod queue_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_queue() {
        let transport = MockTransport::default().respond(TransportResponse::new(200, QUEUE_XML));

        let queue = connection(&transport)
            .get_queue(QueueId::new(30))
            .await
            .unwrap();

        assert_eq!(queue.name(), "orders");
        assert_eq!(queue.queue_manager_id().as_u64(), 7);
        assert_eq!(queue.max_depth(), Some(1000));
        assert_eq!(queue.depth(), 3);
        assert!(queue.send_enabled());

        let request = transport.last_request();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/queues/30.xml");
    }

    #[tokio::test]
    async fn test_get_queue_depth() {
        let transport = MockTransport::default().respond(TransportResponse::new(200, QUEUE_XML));

        let depth = connection(&transport)
            .get_queue_depth(QueueId::new(30))
            .await
            .unwrap();

        assert_eq!(depth, 3);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_depth_is_local_failure() {
        let body = QUEUE_XML.replace("<depth type=\"integer\">3</depth>", "");
        let transport = MockTransport::default().respond(TransportResponse::new(200, body));

        let error = connection(&transport)
            .get_queue_depth(QueueId::new(30))
            .await
            .unwrap_err();

        assert!(matches!(
            local_error(&error),
            LocalError::MalformedResponse {
                operation: "get_queue",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_custom_url_postfix() {
        let transport = MockTransport::default().respond(TransportResponse::new(200, QUEUE_XML));
        let connection = OmqConnection::builder(Credentials::new("alice", "secret").unwrap())
            .config(ClientConfig::default().with_url_postfix(""))
            .transport(transport.clone())
            .build()
            .unwrap();

        connection.get_queue(QueueId::new(30)).await.unwrap();

        assert_eq!(transport.last_request().path, "/queues/30");
    }
}
