//! Common test utilities for OnlineMQ integration tests
//!
//! This module provides:
//! - Tracing setup that writes through the test harness
//! - Connections against a seeded in-memory server
//! - Connections against a wiremock HTTP server, plus XML fixtures

use onlinemq::{
    ClientConfig, Credentials, HttpsTransport, InMemoryServer, OmqConnection, QueueDefinition,
    QueueId,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wiremock::MockServer;

#[allow(dead_code)]
pub const ORDERS: QueueId = QueueId::new(30);
#[allow(dead_code)]
pub const AUDIT: QueueId = QueueId::new(31);
#[allow(dead_code)]
pub const MISSING: QueueId = QueueId::new(999);

/// Install a test subscriber once; `RUST_LOG` controls the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn credentials(user: &str) -> Credentials {
    Credentials::new(user, format!("{}-password", user)).unwrap()
}

/// Server hosting the `orders` and `audit` queues
#[allow(dead_code)]
pub fn seeded_server() -> InMemoryServer {
    InMemoryServer::new()
        .with_queue(
            QueueDefinition::new(ORDERS, "orders")
                .with_description("Incoming orders")
                .with_max_depth(100)
                .with_max_message_length(4096)
                .with_visibility_timeout(Duration::from_secs(30)),
        )
        .with_queue(QueueDefinition::new(AUDIT, "audit"))
}

/// Connection for `user` against an in-memory server
#[allow(dead_code)]
pub fn connect(server: &InMemoryServer, user: &str) -> OmqConnection {
    init_tracing();
    OmqConnection::builder(credentials(user))
        .transport(server.clone())
        .build()
        .unwrap()
}

/// Connection talking HTTP to a wiremock server
#[allow(dead_code)]
pub fn connect_http(server: &MockServer, timeout: Duration) -> OmqConnection {
    init_tracing();
    let config = ClientConfig::builder()
        .base_url(server.uri())
        .timeout(timeout)
        .build()
        .unwrap();
    let transport = HttpsTransport::new(&config).unwrap();

    OmqConnection::builder(Credentials::new("myuser@mail.com", "mypass").unwrap())
        .config(config)
        .transport(transport)
        .build()
        .unwrap()
}

#[allow(dead_code)]
pub fn queue_xml(depth: u64) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<queue>
  <description>Incoming orders</description>
  <id type="integer">30</id>
  <max_depth type="integer">100</max_depth>
  <max_message_length type="integer">4096</max_message_length>
  <name>orders</name>
  <queue_manager_id type="integer">1</queue_manager_id>
  <receive_enabled type="boolean">true</receive_enabled>
  <send_enabled type="boolean">true</send_enabled>
  <visibility_timeout type="integer">30</visibility_timeout>
  <depth type="integer">{}</depth>
</queue>"#,
        depth
    )
}

#[allow(dead_code)]
pub fn message_xml(id: u64, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<message>
  <id type="integer">{}</id>
  <queue_id type="integer">30</queue_id>
  <body_encoding_id type="integer">1</body_encoding_id>
  <priority type="integer">5</priority>
  <body_type_id type="integer">6</body_type_id>
  <sender>myuser@mail.com</sender>
  <body>{}</body>
</message>"#,
        id, body
    )
}

#[allow(dead_code)]
pub fn error_xml(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) => format!(
            r#"<errors><error code="{}">{}</error></errors>"#,
            code, message
        ),
        None => format!("<errors><error>{}</error></errors>", message),
    }
}
