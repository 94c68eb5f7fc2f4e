//! Inbound dispatch loop.
//!
//! Runs once per inbound frame:
//!
//! 1. Notify raw-message listeners with the untouched text
//! 2. Decode the envelope (malformed text is logged and dropped)
//! 3. Apply `@` control directives and stop
//! 4. Notify message listeners with the decoded envelope
//! 5. Look up the handler (unknown identifiers are dropped silently)
//! 6. Invoke it and, if the envelope carried a `callbackId`, send the reply

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use futures_util::FutureExt;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, error, trace, warn};

use crate::protocol::{ControlDirective, Envelope};
use crate::registry::ConnectionEvent;
use crate::transport::Transport;

use super::core::ConnectionInner;

// ============================================================================
// ConnectionInner - Dispatch
// ============================================================================

impl ConnectionInner {
    pub(crate) fn dispatch(&self, text: String) {
        if self.is_shutting_down() {
            trace!("Dropping frame received after close was requested");
            return;
        }

        self.listeners
            .notify(&ConnectionEvent::RawMessage(text.clone()));

        let envelope = match Envelope::decode(&text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, len = text.len(), "Discarding malformed envelope");
                return;
            }
        };

        if envelope.is_control() {
            self.apply_control(&envelope);
            return;
        }

        self.listeners
            .notify(&ConnectionEvent::Message(envelope.clone()));

        let Some(handler) = self.handlers.take_for_dispatch(&envelope.identifier) else {
            trace!(identifier = %envelope.identifier, "No handler registered, dropping");
            return;
        };

        let identifier = envelope.identifier.clone();
        let callback_id = envelope.callback_id.clone();
        let args = envelope.into_args();

        trace!(%identifier, expects_reply = callback_id.is_some(), "Invoking handler");

        let future = match catch_unwind(AssertUnwindSafe(|| handler.call(args))) {
            Ok(future) => future,
            Err(_) => {
                error!(%identifier, "Handler panicked");
                return;
            }
        };
        let mut future = AssertUnwindSafe(future).catch_unwind();

        // Ready results are replied to inline; pending ones on a task so
        // the next frame is not held up.
        let Some(outcome) = (&mut future).now_or_never() else {
            let transport = Arc::clone(&self.transport);
            match Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        let outcome = future.await;
                        finish(transport.as_ref(), &identifier, callback_id, outcome);
                    });
                }
                Err(_) => {
                    error!(%identifier, "Handler is still pending outside a tokio runtime, dropping it");
                }
            }
            return;
        };
        finish(self.transport.as_ref(), &identifier, callback_id, outcome);
    }

    fn apply_control(&self, envelope: &Envelope) {
        match ControlDirective::parse(&envelope.identifier, &envelope.args()) {
            ControlDirective::SetCookie { name, value } => {
                debug!(%name, "Cookie set by peer");
                self.cookies.lock().insert(name, value);
            }
            ControlDirective::DelCookie { name } => {
                debug!(%name, "Cookie deleted by peer");
                self.cookies.lock().remove(&name);
            }
            ControlDirective::Unknown(identifier) => {
                debug!(%identifier, "Ignoring unknown control directive");
            }
        }
    }
}

/// Replies with a handler's result, or logs its panic.
fn finish(
    transport: &dyn Transport,
    identifier: &str,
    callback_id: Option<String>,
    outcome: thread::Result<Value>,
) {
    match outcome {
        Ok(result) => reply(transport, callback_id, result),
        Err(_) => error!(%identifier, "Handler panicked"),
    }
}

/// Sends `result` back to the caller if a reply was requested.
fn reply(transport: &dyn Transport, callback_id: Option<String>, result: Value) {
    let Some(callback_id) = callback_id else {
        return;
    };

    let text = match Envelope::encode(&callback_id, &[result], None) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, %callback_id, "Failed to encode reply");
            return;
        }
    };

    if let Err(e) = transport.send(text) {
        debug!(error = %e, %callback_id, "Reply not sent");
    }
}

// ============================================================================
// Tests
// ============================================================================
