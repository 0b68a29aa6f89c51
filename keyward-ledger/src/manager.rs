// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracks submitted transactions until the ledger reports a final status.
//!
//! The history is a copy-on-write snapshot: writers clone, modify and swap
//! the list under the write lock, readers and listener notification work
//! on an `Arc` they already hold. One background poller per manager runs
//! while any transaction is processing.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::client::LedgerClient;
use crate::state::{TransactionResult, TransactionState};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct TransactionManagerConfig {
    pub poll_interval: Duration,
}

impl Default for TransactionManagerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

type Listener = Arc<dyn Fn(&TransactionState) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Listener)>>,
}

impl Listeners {
    fn snapshot(&self) -> Vec<Listener> {
        self.entries.lock().iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

/// Keeps a listener registered. Dropping it unsubscribes.
#[must_use = "the listener is removed when the handle is dropped"]
pub struct ListenerHandle {
    id: u64,
    listeners: Weak<Listeners>,
}

impl ListenerHandle {
    pub fn unsubscribe(self) {}
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.entries.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

struct Shared {
    client: Arc<dyn LedgerClient>,
    config: TransactionManagerConfig,
    states: RwLock<Arc<Vec<TransactionState>>>,
    scripts: Mutex<HashMap<String, String>>,
    listeners: Arc<Listeners>,
    events: broadcast::Sender<TransactionState>,
    polling: AtomicBool,
}

#[derive(Clone)]
pub struct TransactionStateManager {
    shared: Arc<Shared>,
}

impl TransactionStateManager {
    pub fn new(client: Arc<dyn LedgerClient>, config: TransactionManagerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                client,
                config,
                states: RwLock::new(Arc::new(Vec::new())),
                scripts: Mutex::new(HashMap::new()),
                listeners: Arc::new(Listeners::default()),
                events,
                polling: AtomicBool::new(false),
            }),
        }
    }

    pub fn client(&self) -> &Arc<dyn LedgerClient> {
        &self.shared.client
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&TransactionState) + Send + Sync + 'static,
    {
        let listeners = &self.shared.listeners;
        let id = listeners.next_id.fetch_add(1, Ordering::Relaxed);
        listeners.entries.lock().push((id, Arc::new(listener)));
        ListenerHandle {
            id,
            listeners: Arc::downgrade(listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.entries.lock().len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransactionState> {
        self.shared.events.subscribe()
    }

    /// Starts tracking `state` as pending. Returns false if its id is
    /// already tracked.
    pub fn new_transaction(&self, mut state: TransactionState) -> bool {
        state.status = crate::state::TransactionStatus::Pending;
        state.error_message = None;
        {
            let mut guard = self.shared.states.write();
            if guard.iter().any(|s| s.id == state.id) {
                debug!(id = %state.id, "transaction already tracked");
                return false;
            }
            Arc::make_mut(&mut *guard).insert(0, state.clone());
        }
        info!(id = %state.id, tx_type = ?state.tx_type, "tracking transaction");
        self.shared.notify(&state);
        self.ensure_poller();
        true
    }

    /// Full history, newest first.
    pub fn transactions(&self) -> Arc<Vec<TransactionState>> {
        self.shared.states.read().clone()
    }

    pub fn processing(&self) -> Vec<TransactionState> {
        self.shared.processing()
    }

    pub fn get(&self, id: &str) -> Option<TransactionState> {
        self.shared.states.read().iter().find(|s| s.id == id).cloned()
    }

    /// Most recent transaction still processing.
    pub fn last_visible(&self) -> Option<TransactionState> {
        self.shared
            .states
            .read()
            .iter()
            .find(|s| s.is_processing())
            .cloned()
    }

    pub fn record_script(&self, id: &str, script_id: &str) {
        self.shared
            .scripts
            .lock()
            .insert(id.to_string(), script_id.to_string());
    }

    pub fn script_id(&self, id: &str) -> Option<String> {
        self.shared.scripts.lock().get(id).cloned()
    }

    /// Applies a ledger result to a tracked transaction. Returns the
    /// updated state when it changed.
    pub fn apply_result(&self, id: &str, result: &TransactionResult) -> Option<TransactionState> {
        self.shared.apply_result(id, result)
    }

    /// Queries the ledger once for every processing transaction.
    pub async fn poll_once(&self) {
        self.shared.poll_once().await;
    }

    /// Drops all history. Used on logout.
    pub fn clear(&self) {
        *self.shared.states.write() = Arc::new(Vec::new());
        self.shared.scripts.lock().clear();
        debug!("transaction history cleared");
    }

    pub fn is_polling(&self) -> bool {
        self.shared.polling.load(Ordering::Acquire)
    }

    fn ensure_poller(&self) {
        if self
            .shared
            .polling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, transaction polling disabled");
            self.shared.polling.store(false, Ordering::Release);
            return;
        };
        let weak = Arc::downgrade(&self.shared);
        let period = self.shared.config.poll_interval;
        runtime.spawn(poll_loop(weak, period));
    }
}

async fn poll_loop(shared: Weak<Shared>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        shared.poll_once().await;
        if !shared.processing().is_empty() {
            continue;
        }
        shared.polling.store(false, Ordering::Release);
        // A transaction registered between the check and the store would
        // otherwise go unpolled.
        if shared.processing().is_empty()
            || shared
                .polling
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            debug!("transaction poller idle");
            return;
        }
    }
}

impl Shared {
    fn processing(&self) -> Vec<TransactionState> {
        self.states
            .read()
            .iter()
            .filter(|s| s.is_processing())
            .cloned()
            .collect()
    }

    fn notify(&self, state: &TransactionState) {
        for listener in self.listeners.snapshot() {
            listener(state);
        }
        let _ = self.events.send(state.clone());
    }

    fn apply_result(&self, id: &str, result: &TransactionResult) -> Option<TransactionState> {
        let updated = {
            let mut guard = self.states.write();
            let index = guard.iter().position(|s| s.id == id)?;
            let mut next = guard[index].clone();
            if !next.apply(result) {
                return None;
            }
            Arc::make_mut(&mut *guard)[index] = next.clone();
            next
        };
        if updated.is_failed() {
            warn!(id, error = ?updated.error_message, "transaction failed");
        } else {
            debug!(id, status = %updated.status, "transaction status changed");
        }
        self.notify(&updated);
        Some(updated)
    }

    async fn poll_once(&self) {
        for state in self.processing() {
            match self.client.get_transaction_status(&state.id).await {
                Ok(result) => {
                    self.apply_result(&state.id, &result);
                }
                Err(e) => debug!(id = %state.id, error = %e, "status poll failed, will retry"),
            }
        }
    }
}
