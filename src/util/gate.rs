use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;

#[derive(Debug)]
struct GateState {
    open: bool,
    inside: usize,
}

/// Admission gate with open/closed states.
///
/// Callers `enter` while the gate is open and hold a [`GateGuard`] until they are
/// done. `close` stops new admissions and waits for everyone inside to leave.
#[derive(Debug)]
pub struct ThreadStore {
    state: Mutex<GateState>,
    changed: Notify,
}

/// Proof of admission; exits the gate on drop.
#[derive(Debug)]
pub struct GateGuard<'a> {
    store: &'a ThreadStore,
}

impl Default for ThreadStore {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ThreadStore {
    pub fn new(open: bool) -> Self {
        Self {
            state: Mutex::new(GateState { open, inside: 0 }),
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait until the gate is open, then enter it.
    pub async fn enter(&self) -> GateGuard<'_> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // Registered before the check so an `open` in between is not lost.
            notified.as_mut().enable();
            {
                let mut state = self.lock();
                if state.open {
                    state.inside += 1;
                    return GateGuard { store: self };
                }
            }
            notified.await;
        }
    }

    /// Enter only if the gate is open right now.
    pub fn try_enter(&self) -> Option<GateGuard<'_>> {
        let mut state = self.lock();
        if state.open {
            state.inside += 1;
            Some(GateGuard { store: self })
        } else {
            None
        }
    }

    /// Close the gate and wait until every caller inside has exited.
    pub async fn close(&self) {
        self.lock().open = false;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.lock().inside == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn open(&self) {
        self.lock().open = true;
        self.changed.notify_waiters();
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn inside(&self) -> usize {
        self.lock().inside
    }

    fn exit(&self) {
        {
            let mut state = self.lock();
            state.inside = state.inside.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.store.exit();
    }
}
