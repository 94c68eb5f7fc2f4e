//! Common utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use wsrpc::{Connection, ConnectionBuilder, ConnectionEvent, EventKind, Listener, PendingServer, Status};

/// Upper bound for anything a test waits on.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects a client to a freshly bound local server.
///
/// Returns `(server_side, client)`.
pub async fn pair() -> (Connection, Connection) {
    pair_with(Connection::builder(), Connection::builder()).await
}

/// Like [`pair`] with custom builders for each side.
pub async fn pair_with(
    server_builder: ConnectionBuilder,
    client_builder: ConnectionBuilder,
) -> (Connection, Connection) {
    let server = PendingServer::bind_localhost().await.expect("bind");
    let url = server.ws_url();

    let (accepted, connected) =
        tokio::join!(server.accept_with(server_builder), client_builder.connect(&url));

    (accepted.expect("accept"), connected.expect("connect"))
}

/// Records every status notification.
pub fn record_statuses(connection: &Connection) -> Arc<Mutex<Vec<Status>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    connection
        .add_event_listener(EventKind::StatusChange, status_listener(seen_clone))
        .expect("add listener");
    seen
}

/// Listener pushing each status into `sink`.
pub fn status_listener(sink: Arc<Mutex<Vec<Status>>>) -> Listener {
    Listener::new(move |event| {
        if let ConnectionEvent::StatusChange(status) = event {
            sink.lock().push(*status);
        }
    })
}

/// Polls `condition` until it holds or [`TEST_TIMEOUT`] elapses.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let result = tokio::time::timeout(TEST_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not met within {TEST_TIMEOUT:?}");
}

/// Awaits `future` with [`TEST_TIMEOUT`].
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(TEST_TIMEOUT, future)
        .await
        .expect("timed out")
}
