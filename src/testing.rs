//! In-memory transport for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::connection::{Connection, ConnectionOptions};
use crate::error::Result;
use crate::protocol::Envelope;
use crate::transport::Transport;

/// Records every frame sent and every close request.
#[derive(Clone, Default)]
pub(crate) struct SpyTransport {
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

impl SpyTransport {
    /// Returns a connection in `Opening` state over a fresh spy.
    pub(crate) fn connection() -> (Connection, SpyTransport) {
        let spy = Self::default();
        let connection = Connection::with_transport(spy.clone(), ConnectionOptions::default())
            .expect("default options are valid");
        (connection, spy)
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub(crate) fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent()
            .iter()
            .map(|text| Envelope::decode(text).expect("sent frame is an envelope"))
            .collect()
    }

    pub(crate) fn close_requests(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Yields until at least `count` frames were sent.
    pub(crate) async fn wait_for_sent(&self, count: usize) {
        while self.sent.lock().len() < count {
            tokio::task::yield_now().await;
        }
    }
}

impl Transport for SpyTransport {
    fn send(&self, text: String) -> Result<()> {
        self.sent.lock().push(text);
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
