use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicU64, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    time::Duration,
};


/// What changed, never the changed record itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert,
    #[cfg(test)]
    Update,
    Delete,
}


/// Fans table change signals out to every live subscription.
pub struct ChangeHub {
    subscribers: Mutex<HashMap<u64, Sender<ChangeEvent>>>,
    next_id: AtomicU64,
}

impl ChangeHub {
    pub fn new() -> Arc<Self> {
        Arc::new(ChangeHub {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel();

        self.lock_subscribers().insert(id, sender);
        debug!("Subscription {} opened", id);

        Subscription {
            id,
            receiver,
            hub: Arc::downgrade(self),
        }
    }

    pub fn publish(&self, event: ChangeEvent) {
        let mut subscribers = self.lock_subscribers();

        // Receivers dropped without unsubscribing are pruned here.
        subscribers.retain(|_, sender| sender.send(event).is_ok());
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    fn unsubscribe(&self, id: u64) {
        if self.lock_subscribers().remove(&id).is_some() {
            debug!("Subscription {} closed", id);
        }
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<HashMap<u64, Sender<ChangeEvent>>> {
        self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}


pub struct Subscription {
    id: u64,
    receiver: Receiver<ChangeEvent>,
    hub: Weak<ChangeHub>,
}

impl Subscription {
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ChangeEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    #[cfg(test)]
    pub fn try_recv(&self) -> Result<ChangeEvent, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Empties the queue, returning how many signals were waiting.
    pub fn drain(&self) -> usize {
        self.receiver.try_iter().count()
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}
