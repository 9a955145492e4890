use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::constants::{
    events, BATCH_ENDPOINT, LIB_NAME, LIB_VERSION, OPT_OUT_PROPERTY, USER_UUID_PROPERTY,
};
use super::event::QueuedEvent;
use super::queue::EventQueue;
use crate::api::{ApiClient, Headers, RequestBody, SharedTransport};
use crate::config::{AnalyticsSettings, FlushMode};
use crate::storage::{SharedCache, SharedPropertyStore};
use crate::utils::sha256_hex;

/// Result of one flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued
    Empty,
    /// No project key is configured; the queue is untouched
    Skipped,
    /// The batch was accepted and removed from the queue
    Delivered(usize),
    /// The batch was rejected or could not be sent; the queue is untouched
    Failed,
}

struct Inner {
    queue: EventQueue,
    /// Held from snapshot to removal so flushes never overlap
    sending: tokio::sync::Mutex<()>,
    user_properties: SharedPropertyStore,
    client: ApiClient,
    settings: AnalyticsSettings,
}

/// Telemetry client for one user: opt-out gate, batching and delivery.
///
/// Cheap to clone; clones share the queue.
#[derive(Clone)]
pub struct Analytics {
    inner: Arc<Inner>,
}

impl Analytics {
    pub fn new(
        settings: AnalyticsSettings,
        cache: SharedCache,
        user_properties: SharedPropertyStore,
        transport: SharedTransport,
    ) -> Self {
        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let client = ApiClient::new(settings.base_url.clone(), headers, transport)
            .with_max_retries(settings.max_retries);

        Self {
            inner: Arc::new(Inner {
                queue: EventQueue::new(cache, settings.queue_ttl),
                sending: tokio::sync::Mutex::new(()),
                user_properties,
                client,
                settings,
            }),
        }
    }

    pub fn queue(&self) -> &EventQueue {
        &self.inner.queue
    }

    pub fn settings(&self) -> &AnalyticsSettings {
        &self.inner.settings
    }

    /// Queues an event unless the user opted out, then flushes or schedules a flush.
    ///
    /// Reaching the batch size flushes immediately. Otherwise the first caller to take
    /// the flush lock schedules a delayed flush; later callers just queue. Never fails.
    pub async fn track(&self, event_name: &str, properties: Map<String, Value>) {
        if self.is_opted_out() {
            debug!(event = event_name, "Analytics opted out, event dropped");
            return;
        }

        let event = QueuedEvent::new(event_name, self.distinct_id())
            .with_properties(properties)
            .with_property("$lib", LIB_NAME)
            .with_property("$lib_version", LIB_VERSION)
            .with_property("hashedEmail", self.hashed_email());
        let queued = self.inner.queue.enqueue(event);
        debug!(event = event_name, queued, "Event queued");

        if queued >= self.inner.settings.batch_size {
            self.flush_queue().await;
            return;
        }

        if !self
            .inner
            .queue
            .try_acquire_flush_lock(self.inner.settings.lock_ttl)
        {
            return;
        }

        let delay = self.inner.settings.flush_delay;
        match self.inner.settings.flush_mode {
            FlushMode::Inline => {
                tokio::time::sleep(delay).await;
                self.flush_queue().await;
            }
            FlushMode::Background => {
                let this = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    this.flush_queue().await;
                });
            }
        }
    }

    /// Sends every queued event as one batch.
    ///
    /// Releases the flush lock before sending so later events can schedule the next
    /// flush. On success only the delivered events are removed. Concurrent calls on
    /// the same client wait for each other, so each event is sent once.
    pub async fn flush_queue(&self) -> FlushOutcome {
        let _sending = self.inner.sending.lock().await;
        let queue = &self.inner.queue;
        let batch = queue.events();
        queue.release_flush_lock();

        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        let Some(api_key) = self.inner.settings.project_key.as_deref() else {
            warn!(queued = batch.len(), "Analytics project key not configured, flush skipped");
            return FlushOutcome::Skipped;
        };

        let count = batch.len();
        let body = RequestBody::Json(json!({
            "api_key": api_key,
            "historical_migration": false,
            "batch": batch,
        }));

        match self.inner.client.post(BATCH_ENDPOINT, &body, None).await {
            Ok(response) if response.is_success() => {
                queue.remove_delivered(count);
                info!(count, "Analytics batch delivered");
                FlushOutcome::Delivered(count)
            }
            Ok(response) => {
                error!(status = response.status, count, "Analytics batch rejected");
                FlushOutcome::Failed
            }
            Err(e) => {
                error!(error = %e, count, "Failed to send analytics batch");
                FlushOutcome::Failed
            }
        }
    }

    /// Flushes every `period`, first after one full period
    pub fn spawn_periodic_flush(&self, period: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let outcome = this.flush_queue().await;
                debug!(?outcome, "Periodic analytics flush");
            }
        })
    }

    /// Stores the preference, then records the change (only visible when opting in)
    pub async fn set_opt_out(&self, opt_out: bool) {
        if let Err(e) = self
            .inner
            .user_properties
            .set(OPT_OUT_PROPERTY, &opt_out.to_string())
        {
            error!(error = %e, "Failed to store analytics preference");
        }

        let mut properties = Map::new();
        properties.insert("optOut".to_string(), Value::Bool(opt_out));
        self.track(events::ANALYTICS_OPT_CHANGE, properties).await;
    }

    pub fn is_opted_out(&self) -> bool {
        self.inner.user_properties.get(OPT_OUT_PROPERTY).as_deref() == Some("true")
    }

    /// Persistent pseudo-anonymous id, created on first use
    pub fn distinct_id(&self) -> String {
        let store = &self.inner.user_properties;
        if let Some(id) = store.get(USER_UUID_PROPERTY).filter(|id| !id.is_empty()) {
            return id;
        }

        let id = Uuid::new_v4().to_string();
        if let Err(e) = store.set(USER_UUID_PROPERTY, &id) {
            warn!(error = %e, "Failed to persist analytics id");
        }
        id
    }

    /// SHA-256 hex of the normalized user email, when one is configured
    pub fn hashed_email(&self) -> Option<String> {
        let email = self.inner.settings.user_email.as_deref()?.trim();
        if email.is_empty() || !email.contains('@') {
            return None;
        }
        Some(sha256_hex(&email.to_lowercase()))
    }
}
