//! Integration tests for connection status, disconnect and failures.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{eventually, pair, pair_with, record_statuses, status_listener, within};
use parking_lot::Mutex;
use serde_json::Value;
use wsrpc::{Connection, Error, ErrorHandler, EventKind, PendingServer, Status};

#[tokio::test]
async fn builder_listener_observes_open() {
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let client_builder =
        Connection::builder().listener(EventKind::StatusChange, status_listener(Arc::clone(&statuses)));

    let (_server_side, client) = pair_with(Connection::builder(), client_builder).await;

    assert_eq!(client.status(), Status::Open);
    assert_eq!(*statuses.lock(), vec![Status::Open]);
}

#[tokio::test]
async fn disconnect_notifies_closed_exactly_once() {
    let (server_side, client) = pair().await;
    let client_statuses = record_statuses(&client);
    let server_statuses = record_statuses(&server_side);

    within(client.disconnect_async()).await.expect("disconnect");

    assert_eq!(client.status(), Status::Closed);
    assert_eq!(*client_statuses.lock(), vec![Status::Closed]);

    eventually(|| server_side.status() == Status::Closed).await;
    assert_eq!(*server_statuses.lock(), vec![Status::Closed]);

    // Repeated requests are harmless.
    client.disconnect();
    within(client.disconnect_async()).await.expect("disconnect again");
    assert_eq!(*client_statuses.lock(), vec![Status::Closed]);
}

#[tokio::test]
async fn no_handler_runs_after_disconnect_requested() {
    let (server_side, client) = pair().await;
    let calls = Arc::new(AtomicUsize::new(0));

    let calls_clone = Arc::clone(&calls);
    client.set_message_handler("late", move |_| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        async {}
    });

    client.disconnect();
    // In flight while the close handshake runs.
    let _ = server_side.send("late", ());

    eventually(|| client.status().is_terminal()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn calls_fail_after_close() {
    let (_server_side, client) = pair().await;
    within(client.disconnect_async()).await.expect("disconnect");

    assert!(matches!(client.send("x", ()), Err(Error::ConnectionClosed)));
    assert!(matches!(
        client.waiter::<_, Value>("x", ()).await,
        Err(Error::ConnectionClosed)
    ));
}

#[tokio::test]
async fn pending_waiter_fails_when_peer_closes() {
    let (server_side, client) = pair().await;

    let caller = client.clone();
    let call = tokio::spawn(async move { caller.waiter::<_, Value>("never", ()).await });

    eventually(|| client.pending_waiters() == 1).await;
    server_side.disconnect();

    let result = within(call).await.expect("join");
    assert!(matches!(result, Err(Error::ConnectionClosed)));
    assert_eq!(client.status(), Status::Closed);
}

#[tokio::test]
async fn dropping_every_handle_closes_the_socket() {
    let (server_side, client) = pair().await;
    drop(client);

    eventually(|| server_side.status() == Status::Closed).await;
}

#[tokio::test]
async fn connect_failure_reaches_error_handler() {
    // Bind then drop to obtain a port nobody listens on.
    let port = PendingServer::bind_localhost().await.expect("bind").port();

    let errors = Arc::new(AtomicUsize::new(0));
    let errors_clone = Arc::clone(&errors);
    let on_error: ErrorHandler = Arc::new(move |err: &Error| {
        assert!(err.is_connection_error());
        errors_clone.fetch_add(1, Ordering::SeqCst);
    });

    let result = within(wsrpc::connect_with(
        &format!("ws://127.0.0.1:{port}"),
        Some(on_error),
        false,
    ))
    .await;

    assert!(matches!(result, Err(Error::ConnectionFailure { .. })));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_url_is_rejected() {
    assert!(matches!(
        wsrpc::connect("not a url").await,
        Err(Error::Config { .. })
    ));
    assert!(matches!(
        wsrpc::connect("https://example.com").await,
        Err(Error::Config { .. })
    ));
}
