use crate::remote::{ChangeEvent, Table};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Settle windows applied between a change notification and the refresh it
/// triggers.
///
/// Card notifications are delayed so a burst of echoes from this client's own
/// position writes does not clobber an optimistic update with a half-written
/// authoritative state. Board and list notifications refresh immediately.
#[derive(Debug, Clone)]
pub struct DebounceConfig {
    pub cards: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            cards: Duration::from_millis(100),
        }
    }
}

/// Debounced refresh scheduler keyed by table.
///
/// [`notify`](Self::notify) arms a delayed refresh for the event's table; a
/// second notification for the same table inside the window resets the timer
/// rather than stacking a second refresh. Expired timers emit the table on
/// the receiver handed out at construction; the consumer performs the actual
/// snapshot fetch.
pub struct RefreshScheduler {
    config: DebounceConfig,
    pending: Mutex<HashMap<Table, AbortHandle>>,
    tx: mpsc::UnboundedSender<Table>,
}

impl RefreshScheduler {
    pub fn new(config: DebounceConfig) -> (Self, mpsc::UnboundedReceiver<Table>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                config,
                pending: Mutex::new(HashMap::new()),
                tx,
            },
            rx,
        )
    }

    fn settle_for(&self, table: Table) -> Duration {
        match table {
            Table::Cards => self.config.cards,
            Table::Boards | Table::Lists => Duration::ZERO,
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn notify(&self, event: ChangeEvent) {
        let table = event.table;
        let delay = self.settle_for(table);

        let mut pending = self.pending.lock().unwrap();
        if let Some(armed) = pending.remove(&table) {
            armed.abort();
        }

        if delay.is_zero() {
            let _ = self.tx.send(table);
            return;
        }

        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(table);
        });
        pending.insert(table, task.abort_handle());
    }
}
