use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;

/// Decoded data section of an inbound push message. All fields arrive as
/// strings on the wire; absent or garbled values fall back to the dispatch
/// defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub hour: Option<String>,
    pub minute: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "scheduleId")]
    pub schedule_id: Option<String>,
}

/// How a push message reached the app. All three paths funnel into the same
/// dispatch call; the distinction only matters for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushDelivery {
    /// Delivered while the app was in the foreground.
    Foreground,
    /// The user tapped the notification to open the running app.
    Opened,
    /// The notification cold-started the app.
    Initial,
}

pub type PushHandler = Arc<dyn Fn(PushDelivery, PushPayload) + Send + Sync>;

/// Undoes a handler registration. Runs on drop as well, so listeners cannot
/// outlive the screen that registered them.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

pub trait PushChannel {
    fn subscribe(&self, handler: PushHandler) -> Subscription;
}

/// Push channel fed from inside the process. Stands in for the platform
/// message service, which only hands the core a decoded payload anyway.
pub struct InProcessPushChannel {
    handlers: Arc<Mutex<HashMap<u64, PushHandler>>>,
    next_id: AtomicU64,
    initial: Mutex<Option<PushPayload>>,
}

impl InProcessPushChannel {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            initial: Mutex::new(None),
        }
    }

    pub fn publish(&self, delivery: PushDelivery, payload: PushPayload) {
        let handlers: Vec<PushHandler> =
            self.handlers.lock().unwrap().values().cloned().collect();
        for handler in handlers {
            handler(delivery, payload.clone());
        }
    }

    /// Stashes the payload that cold-started the process.
    pub fn set_initial(&self, payload: PushPayload) {
        *self.initial.lock().unwrap() = Some(payload);
    }

    /// The cold-start payload, surrendered at most once.
    pub fn take_initial(&self) -> Option<PushPayload> {
        self.initial.lock().unwrap().take()
    }
}

impl PushChannel for InProcessPushChannel {
    fn subscribe(&self, handler: PushHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().unwrap().insert(id, handler);

        let handlers = Arc::clone(&self.handlers);
        Subscription::new(move || {
            handlers.lock().unwrap().remove(&id);
        })
    }
}
