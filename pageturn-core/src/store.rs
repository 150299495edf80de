//! Reactive state container
//!
//! A [`Store`] owns one value. Writers go through [`Store::update`]; every
//! subscriber is called with the committed value once the write is done.
//! Listeners run while the value is borrowed and must not write back into
//! the same store.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Rc<dyn Fn(&T)>;

pub struct Store<T> {
    value: RefCell<T>,
    listeners: RefCell<Vec<(SubscriptionId, Listener<T>)>>,
    next_id: Cell<u64>,
}

impl<T> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Borrow the current value. Do not hold the guard across an `.await`.
    pub fn read(&self) -> Ref<'_, T> {
        self.value.borrow()
    }

    /// Project part of the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Apply `f`, then notify subscribers.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut self.value.borrow_mut());
        self.notify();
        result
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn notify(&self) {
        // Snapshot so a listener may subscribe or unsubscribe while running.
        let listeners: Vec<Listener<T>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        let value = self.value.borrow();
        for listener in listeners {
            listener(&value);
        }
    }
}

impl<T: Clone> Store<T> {
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }
}
