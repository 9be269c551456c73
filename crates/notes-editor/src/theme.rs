use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

type Listener = Box<dyn FnMut(ThemeMode)>;

#[derive(Default)]
struct Listeners {
    mode: ThemeMode,
    next_id: u64,
    entries: Vec<(u64, Listener)>,
    /// Ids dropped while their listener list was out for notification.
    removed: Vec<u64>,
}

/// The application's current color theme, observed through explicit
/// subscriptions.
#[derive(Clone, Default)]
pub struct ThemeState {
    inner: Rc<RefCell<Listeners>>,
}

impl ThemeState {
    pub fn new(mode: ThemeMode) -> Self {
        let state = Self::default();
        state.inner.borrow_mut().mode = mode;
        state
    }

    pub fn mode(&self) -> ThemeMode {
        self.inner.borrow().mode
    }

    /// Switch the theme, notifying subscribers when it actually changed.
    pub fn set_mode(&self, mode: ThemeMode) {
        let mut entries = {
            let mut inner = self.inner.borrow_mut();
            if inner.mode == mode {
                return;
            }
            inner.mode = mode;
            std::mem::take(&mut inner.entries)
        };

        for (_, listener) in entries.iter_mut() {
            listener(mode);
        }

        let mut inner = self.inner.borrow_mut();
        let removed = std::mem::take(&mut inner.removed);
        entries.retain(|(id, _)| !removed.contains(id));
        entries.append(&mut inner.entries);
        inner.entries = entries;
    }

    /// Call `listener` on every theme change until the subscription drops.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: impl FnMut(ThemeMode) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push((id, Box::new(listener)));
        Subscription {
            id,
            state: Rc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }
}

pub struct Subscription {
    id: u64,
    state: Weak<RefCell<Listeners>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let Ok(mut inner) = state.try_borrow_mut() else {
            return;
        };
        let before = inner.entries.len();
        inner.entries.retain(|(id, _)| *id != self.id);
        if inner.entries.len() == before {
            inner.removed.push(self.id);
        }
    }
}
