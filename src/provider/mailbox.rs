//! Single-slot "latest value wins" hand-off between threads.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Holds at most one pending value. Senders overwrite, readers take.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Stores `value`, replacing any value not yet taken.
    pub fn send(&self, value: T) {
        let mut slot = self.slot.lock();
        *slot = Some(value);
        self.ready.notify_all();
    }

    /// Takes the pending value without waiting.
    pub fn try_take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// Waits until a value is pending and takes it.
    pub fn take_blocking(&self) -> T {
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.take() {
                return value;
            }
            self.ready.wait(&mut slot);
        }
    }

    /// Like [`Mailbox::take_blocking`] but gives up after `timeout`.
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            self.ready.wait_while_for(&mut slot, |s| s.is_none(), timeout);
        }
        slot.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_latest_value_wins() {
        let mailbox = Mailbox::new();
        for i in 1..=5 {
            mailbox.send(i);
        }
        assert_eq!(mailbox.try_take(), Some(5));
        assert_eq!(mailbox.try_take(), None);
    }

    #[test]
    fn test_take_blocking_wakes_on_send() {
        let mailbox = Arc::new(Mailbox::new());
        let sender = Arc::clone(&mailbox);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sender.send("fresh");
        });
        assert_eq!(mailbox.take_blocking(), "fresh");
        handle.join().unwrap();
    }

    #[test]
    fn test_take_timeout_expires() {
        let mailbox: Mailbox<u8> = Mailbox::new();
        assert_eq!(mailbox.take_timeout(Duration::from_millis(10)), None);
        mailbox.send(7);
        assert_eq!(mailbox.take_timeout(Duration::from_millis(10)), Some(7));
    }
}
