//! Outbound calls: fire-and-forget `send` and correlated `waiter`.
//!
//! A reply is an ordinary call to a handler named after the correlation
//! ID, so waiters reuse the handler table with a one-shot entry instead of
//! keeping a second map.

// ============================================================================
// Imports
// ============================================================================

use std::future::ready;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CorrelationId;
use crate::protocol::{Envelope, collapse_reply, to_args};
use crate::registry::Handler;

use super::core::{Connection, ConnectionInner};

// ============================================================================
// PendingGuard
// ============================================================================

/// Tracks one outstanding waiter.
///
/// Dropping it (reply received, timeout, send failure or the caller
/// abandoning the future) removes the correlation handler.
struct PendingGuard {
    inner: Arc<ConnectionInner>,
    key: String,
}

impl PendingGuard {
    fn new(inner: &Arc<ConnectionInner>, key: String) -> Self {
        inner.pending_waiters.fetch_add(1, Ordering::SeqCst);
        Self {
            inner: Arc::clone(inner),
            key,
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.inner.handlers.remove(&self.key) {
            trace!(correlation_id = %self.key, "Removed unanswered correlation handler");
        }
        self.inner.pending_waiters.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Connection - Outbound Calls
// ============================================================================

impl Connection {
    /// Calls `identifier` on the peer without waiting for anything.
    ///
    /// `args` is a tuple or sequence of positional arguments; `()` sends none.
    ///
    /// # Errors
    ///
    /// - [`Error::NonSerializableArgument`] if `args` fail to serialize
    ///   (nothing is sent)
    /// - [`Error::ConnectionClosed`] if the connection is not open
    pub fn send<A: Serialize>(&self, identifier: &str, args: A) -> Result<()> {
        let args = to_args(args)?;
        self.ensure_open()?;

        let text = Envelope::encode(identifier, &args, None)?;
        trace!(%identifier, args = args.len(), "Sending");
        self.inner.transport.send(text)
    }

    /// Calls `identifier` on the peer and waits for its reply.
    ///
    /// A reply with exactly one argument resolves to that argument; any
    /// other reply resolves to the full argument array. The value is then
    /// deserialized into `R` (use [`Value`] to keep it untyped).
    ///
    /// Uses the connection's
    /// [`waiter_timeout`](crate::ConnectionOptions::waiter_timeout); without
    /// one, waits until the reply arrives or the connection ends.
    ///
    /// # Errors
    ///
    /// - [`Error::NonSerializableArgument`] if `args` fail to serialize
    ///   (nothing is sent)
    /// - [`Error::ConnectionClosed`] if the connection is not open or ends
    ///   before the reply arrives
    /// - [`Error::WaiterTimeout`] if the configured timeout elapses
    /// - [`Error::Config`] if `max_pending_waiters` is reached
    /// - [`Error::Json`] if the reply does not deserialize into `R`
    pub async fn waiter<A, R>(&self, identifier: &str, args: A) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let limit = self.inner.options.waiter_timeout;
        self.call(identifier, args, limit).await
    }

    /// Like [`Connection::waiter`] with an explicit timeout for this call.
    ///
    /// # Errors
    ///
    /// See [`Connection::waiter`].
    pub async fn waiter_with_timeout<A, R>(
        &self,
        identifier: &str,
        args: A,
        limit: Duration,
    ) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        self.call(identifier, args, Some(limit)).await
    }

    async fn call<A, R>(&self, identifier: &str, args: A, limit: Option<Duration>) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let args = to_args(args)?;
        self.ensure_open()?;

        if let Some(max) = self.inner.options.max_pending_waiters {
            let pending = self.pending_waiters();
            if pending >= max {
                warn!(pending, max, "Too many pending waiters");
                return Err(Error::config(format!(
                    "Too many pending waiters: {pending}/{max}"
                )));
            }
        }

        let correlation_id = CorrelationId::generate();
        let key = correlation_id.to_string();
        let (_guard, reply_rx) = self.register_reply(key.clone())?;

        let text = Envelope::encode(identifier, &args, Some(&key))?;
        self.inner.transport.send(text)?;
        debug!(%identifier, %correlation_id, "Waiting for reply");

        let reply = match limit {
            Some(limit) => match timeout(limit, reply_rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    debug!(%identifier, %correlation_id, "Waiter timed out");
                    return Err(Error::waiter_timeout(
                        correlation_id,
                        limit.as_millis() as u64,
                    ));
                }
            },
            None => reply_rx.await,
        };

        let value = reply.map_err(|_| Error::ConnectionClosed)?;
        trace!(%correlation_id, "Reply received");
        Ok(serde_json::from_value(value)?)
    }

    /// Installs the one-shot handler that receives the reply for `key`.
    fn register_reply(&self, key: String) -> Result<(PendingGuard, oneshot::Receiver<Value>)> {
        let (reply_tx, reply_rx) = oneshot::channel::<Value>();

        // Register before sending so the reply cannot outrun the handler.
        let slot = Mutex::new(Some(reply_tx));
        self.inner.handlers.once(
            key.clone(),
            Handler::new(move |reply| {
                if let Some(tx) = slot.lock().take() {
                    let _ = tx.send(collapse_reply(reply));
                }
                ready(())
            }),
        );
        let guard = PendingGuard::new(&self.inner, key);

        // A terminal transition may have cleared the table just before the
        // entry landed; the guard removes it again.
        self.ensure_open()?;
        Ok((guard, reply_rx))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.is_usable() {
            Ok(())
        } else {
            Err(Error::ConnectionClosed)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde::ser::Error as _;
    use serde_json::json;

    use crate::connection::ConnectionOptions;
    use crate::testing::SpyTransport;
    use crate::transport::TransportEvent;

    struct Callable;

    impl Serialize for Callable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("functions cannot be serialized"))
        }
    }

    fn open_with(options: ConnectionOptions) -> (Connection, SpyTransport) {
        let spy = SpyTransport::default();
        let connection = Connection::with_transport(spy.clone(), options).expect("connection");
        connection.handle_event(TransportEvent::Open);
        (connection, spy)
    }

    fn open() -> (Connection, SpyTransport) {
        open_with(ConnectionOptions::default())
    }

    fn answer(connection: &Connection, callback_id: &str, args: Value) {
        let text = json!({"identifier": callback_id, "message": args, "callbackId": null});
        connection.handle_event(TransportEvent::Message(text.to_string()));
    }

    #[test]
    fn test_send_builds_fire_and_forget_envelope() {
        let (connection, spy) = open();
        connection.send("log", ("hello", 2)).expect("send");

        let sent = spy.sent_envelopes();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].identifier, "log");
        assert_eq!(sent[0].message, json!(["hello", 2]));
        assert!(sent[0].callback_id.is_none());
    }

    #[test]
    fn test_send_rejects_callable_before_sending() {
        let (connection, spy) = open();
        let err = connection.send("log", ("ok", Callable)).unwrap_err();

        assert!(matches!(err, Error::NonSerializableArgument { .. }));
        assert!(spy.sent().is_empty());
    }

    #[test]
    fn test_send_on_closed_connection() {
        let (connection, spy) = open();
        connection.handle_event(TransportEvent::Close {
            code: 1000,
            reason: String::new(),
        });

        assert!(matches!(
            connection.send("log", ()),
            Err(Error::ConnectionClosed)
        ));
        assert!(spy.sent().is_empty());
    }

    #[tokio::test]
    async fn test_waiter_rejects_callable_before_sending() {
        let (connection, spy) = open();
        let result: Result<Value> = connection.waiter("echo", (Callable,)).await;

        assert!(matches!(result, Err(Error::NonSerializableArgument { .. })));
        assert!(spy.sent().is_empty());
        assert_eq!(connection.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn test_waiter_resolves_with_single_reply_value() {
        let (connection, spy) = open();

        let caller = connection.clone();
        let call = tokio::spawn(async move { caller.waiter::<_, String>("echo", ("hi",)).await });

        spy.wait_for_sent(1).await;
        let request = spy.sent_envelopes().remove(0);
        assert_eq!(request.identifier, "echo");
        assert_eq!(request.message, json!(["hi"]));
        let callback_id = request.callback_id.expect("callback id");

        answer(&connection, &callback_id, json!(["hi!"]));
        assert_eq!(call.await.expect("join").expect("reply"), "hi!");
        assert_eq!(connection.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn test_waiter_multi_argument_reply_is_array() {
        let (connection, spy) = open();

        let caller = connection.clone();
        let call = tokio::spawn(async move { caller.waiter::<_, Value>("pair", ()).await });

        spy.wait_for_sent(1).await;
        let callback_id = spy.sent_envelopes()[0].callback_id.clone().expect("id");
        answer(&connection, &callback_id, json!([1, 2]));

        assert_eq!(call.await.expect("join").expect("reply"), json!([1, 2]));
    }

    #[tokio::test]
    async fn test_out_of_order_replies() {
        let (connection, spy) = open();

        let first = connection.clone();
        let second = connection.clone();
        let call_1 = tokio::spawn(async move { first.waiter::<_, i64>("id", (1,)).await });
        let call_2 = tokio::spawn(async move { second.waiter::<_, i64>("id", (2,)).await });

        spy.wait_for_sent(2).await;
        let requests = spy.sent_envelopes();
        assert_ne!(requests[0].callback_id, requests[1].callback_id);

        for request in requests.iter().rev() {
            let input = request.message[0].as_i64().expect("int");
            answer(
                &connection,
                request.callback_id.as_deref().expect("id"),
                json!([input * 10]),
            );
        }

        assert_eq!(call_1.await.expect("join").expect("reply"), 10);
        assert_eq!(call_2.await.expect("join").expect("reply"), 20);
    }

    #[tokio::test]
    async fn test_duplicate_reply_is_dropped() {
        let (connection, spy) = open();

        let caller = connection.clone();
        let call = tokio::spawn(async move { caller.waiter::<_, i64>("n", ()).await });

        spy.wait_for_sent(1).await;
        let callback_id = spy.sent_envelopes()[0].callback_id.clone().expect("id");
        answer(&connection, &callback_id, json!([1]));
        answer(&connection, &callback_id, json!([2]));

        assert_eq!(call.await.expect("join").expect("reply"), 1);
    }

    #[tokio::test]
    async fn test_waiter_timeout_cleans_up() {
        let (connection, spy) = open_with(
            ConnectionOptions::new().with_waiter_timeout(Duration::from_millis(20)),
        );

        let err = connection
            .waiter::<_, Value>("silent", ())
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(connection.pending_waiters(), 0);

        let callback_id = spy.sent_envelopes()[0].callback_id.clone().expect("id");
        assert!(!connection.inner.handlers.contains(&callback_id));
    }

    #[tokio::test]
    async fn test_waiter_with_timeout_overrides_default() {
        let (connection, _) = open();
        let result = connection
            .waiter_with_timeout::<_, Value>("silent", (), Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(Error::WaiterTimeout { .. })));
    }

    #[tokio::test]
    async fn test_waiter_fails_when_connection_closes() {
        let (connection, spy) = open();

        let caller = connection.clone();
        let call = tokio::spawn(async move { caller.waiter::<_, Value>("never", ()).await });

        spy.wait_for_sent(1).await;
        connection.handle_event(TransportEvent::Close {
            code: 1006,
            reason: String::new(),
        });

        assert!(matches!(
            call.await.expect("join"),
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_abandoned_waiter_removes_handler() {
        let (connection, spy) = open();

        let caller = connection.clone();
        let call = tokio::spawn(async move { caller.waiter::<_, Value>("never", ()).await });

        spy.wait_for_sent(1).await;
        assert_eq!(connection.pending_waiters(), 1);
        call.abort();
        let _ = call.await;

        assert_eq!(connection.pending_waiters(), 0);
        assert!(connection.inner.handlers.is_empty());
    }

    #[test]
    fn test_reply_registration_after_close_is_undone() {
        let (connection, _) = open();
        connection.handle_event(TransportEvent::Close {
            code: 1006,
            reason: String::new(),
        });

        let result = connection.register_reply(CorrelationId::generate().to_string());

        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert!(connection.inner.handlers.is_empty());
        assert_eq!(connection.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn test_max_pending_waiters() {
        let (connection, spy) = open_with(ConnectionOptions::new().with_max_pending_waiters(1));

        let caller = connection.clone();
        let _held = tokio::spawn(async move { caller.waiter::<_, Value>("slow", ()).await });
        spy.wait_for_sent(1).await;

        let result = connection.waiter::<_, Value>("slow", ()).await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_reply_type_mismatch() {
        let (connection, spy) = open();

        let caller = connection.clone();
        let call = tokio::spawn(async move { caller.waiter::<_, i64>("n", ()).await });

        spy.wait_for_sent(1).await;
        let callback_id = spy.sent_envelopes()[0].callback_id.clone().expect("id");
        answer(&connection, &callback_id, json!(["not a number"]));

        assert!(matches!(call.await.expect("join"), Err(Error::Json(_))));
    }
}
