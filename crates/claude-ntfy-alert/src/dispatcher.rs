//! Background notification delivery.
//!
//! The [`NtfyDispatcher`] runs on a dedicated `std::thread` with its own
//! single-threaded tokio runtime. [`Notifier::notify`] is a non-blocking
//! `try_send` into a bounded channel; the thread drains the channel and
//! performs the HTTP POSTs. A failed delivery is logged and forgotten --
//! the at-most-once contract of the engine outranks delivery guarantees,
//! so there are no retries.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

use claude_ntfy_types::WrapError;
use tracing::{error, info, warn};

use crate::ntfy;
use crate::{Notification, Notifier};

/// Pending notifications before `notify` starts dropping. The engine fires
/// at most twice per session (startup + backstop), so this never fills in
/// practice.
const QUEUE_CAPACITY: usize = 8;

/// Per-request timeout. Deliveries race process exit, so keep it short.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the delivery thread.
///
/// Shared as an `Arc<dyn Notifier>` by the engine while the entry point
/// keeps the right to [`close`](Self::close) it, so both halves live behind
/// small mutexes that are only touched on send and shutdown.
pub struct NtfyDispatcher {
    tx: Mutex<Option<SyncSender<Notification>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl NtfyDispatcher {
    /// Spawn the delivery thread for the given server and topic.
    pub fn spawn(server: &str, topic: &str) -> Result<Self, WrapError> {
        let url = ntfy::publish_url(server, topic);
        let topic = topic.to_string();
        let (tx, rx) = mpsc::sync_channel(QUEUE_CAPACITY);

        let handle = std::thread::Builder::new()
            .name("ntfy-dispatch".into())
            .spawn(move || run(url, topic, rx))
            .map_err(|e| WrapError::Notify(format!("failed to spawn dispatcher thread: {e}")))?;

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Drop the sender and wait for the thread to drain the queue, so a
    /// notification fired just before exit still goes out. Idempotent.
    pub fn close(&self) {
        drop(self.tx.lock().expect("dispatcher sender lock poisoned").take());
        let handle = self
            .handle
            .lock()
            .expect("dispatcher handle lock poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Notifier for NtfyDispatcher {
    fn notify(&self, notification: Notification) {
        let tx = self.tx.lock().expect("dispatcher sender lock poisoned");
        let Some(tx) = tx.as_ref() else {
            warn!(title = %notification.title, "dispatcher already closed, dropping");
            return;
        };
        match tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                warn!(title = %n.title, "notification queue full, dropping");
            }
            Err(TrySendError::Disconnected(n)) => {
                warn!(title = %n.title, "notification dispatcher is gone, dropping");
            }
        }
    }
}

/// Delivery loop body. Blocks on `recv()` until all senders are dropped.
fn run(url: String, topic: String, rx: Receiver<Notification>) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to create tokio runtime for notification dispatcher: {e}");
            return;
        }
    };

    rt.block_on(async {
        let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
            Ok(c) => c,
            Err(e) => {
                error!("failed to build HTTP client: {e}");
                return;
            }
        };

        while let Ok(notification) = rx.recv() {
            let payload = ntfy::Payload {
                topic: &topic,
                title: &notification.title,
                message: &notification.body,
            };

            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(
                        kind = notification.kind.as_str(),
                        status = resp.status().as_u16(),
                        "notification delivered"
                    );
                }
                Ok(resp) => {
                    warn!(
                        kind = notification.kind.as_str(),
                        status = resp.status().as_u16(),
                        "ntfy returned non-success, dropping notification"
                    );
                }
                Err(e) => {
                    error!(kind = notification.kind.as_str(), "ntfy request failed: {e}");
                }
            }
        }

        info!("notification dispatcher shutting down (channel closed)");
    });
}
