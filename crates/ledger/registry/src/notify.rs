//! Notification fan-out for committed registry events.

use eternal_ledger_types::EventRecord;
use tokio::sync::broadcast;

/// Broadcasts committed events to live subscribers.
///
/// Publishing happens after the storage commit, so a missing or lagging
/// subscriber can never fail or roll back a mutation. Subscribers that fall
/// behind receive `RecvError::Lagged` and can catch up from the persisted log
/// via [`EternalLedger::events`](crate::EternalLedger::events).
pub struct Notifier {
    sender: broadcast::Sender<EventRecord>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, record: EventRecord) {
        // No receivers is not an error
        let _ = self.sender.send(record);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
