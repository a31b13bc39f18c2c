//! # Change Notification
//!
//! Two small building blocks replace framework reactivity:
//!
//! - [`Subscribers<T>`]: a registry of callbacks, each invoked with a `&T`
//!   when [`Subscribers::notify`] runs. Registering returns a
//!   [`Subscription`] guard that removes the callback when dropped.
//! - [`Observable<T>`]: a shared value with `get`/`set` that notifies its
//!   subscribers on every `set`.
//!
//! Everything is single-threaded (`Rc`/`RefCell`). A callback lives exactly
//! as long as its [`Subscription`]: hold the guard to keep listening, drop it
//! (or call [`Subscription::unsubscribe`]) to stop. A listener meant to
//! outlive every handle is kept with [`Subscription::detach`]. Once the
//! registry is gone or cleared, outstanding subscriptions are inert.
//!
//! A callback that causes its own registry to notify again (directly or
//! through a chain of listeners) is skipped for the nested round with a
//! warning rather than panicking on the `RefCell`.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Registry<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

impl<T> Registry<T> {
    // Callbacks are handed back so they drop after the borrow ends; a
    // callback may own a Subscription into this same registry.
    fn remove(&mut self, id: u64) -> Option<Callback<T>> {
        let index = self.entries.iter().position(|(entry_id, _)| *entry_id == id)?;
        Some(self.entries.remove(index).1)
    }
}

/// A set of callbacks interested in values of type `T`.
pub struct Subscribers<T> {
    registry: Rc<RefCell<Registry<T>>>,
}

impl<T: 'static> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Registers `callback` and returns its unsubscribe handle.
    pub fn add<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry
                .entries
                .push((id, Rc::new(RefCell::new(callback)) as Callback<T>));
            id
        };

        let weak: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.registry);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    let removed = registry.borrow_mut().remove(id);
                    drop(removed);
                }
            })),
        }
    }

    /// Invokes every registered callback with `value`.
    ///
    /// The callback list is snapshotted first, so callbacks may subscribe or
    /// unsubscribe while being notified.
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .registry
            .borrow()
            .entries
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();

        for callback in callbacks {
            match callback.try_borrow_mut() {
                Ok(mut f) => (*f)(value),
                Err(_) => log::warn!("Skipping re-entrant change listener"),
            };
        }
    }

    /// Drops every callback. Outstanding subscriptions become no-ops.
    pub fn clear(&self) {
        let entries = std::mem::take(&mut self.registry.borrow_mut().entries);
        drop(entries);
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Subscribers<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<T> fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.registry.borrow().entries.len())
            .finish()
    }
}

/// Guard returned when registering a callback. Dropping it unsubscribes.
#[must_use = "the callback is removed as soon as the subscription is dropped"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Removes the callback from its registry. A no-op if the registry has
    /// been cleared or dropped in the meantime.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Gives up the handle and leaves the callback registered until the
    /// registry is cleared or dropped.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// A shared, observable value.
///
/// Clones share the same value and the same subscribers.
pub struct Observable<T> {
    value: Rc<RefCell<T>>,
    subscribers: Subscribers<T>,
}

impl<T: Clone + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
            subscribers: Subscribers::new(),
        }
    }

    /// A copy of the current value.
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Runs `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Replaces the value wholesale and notifies subscribers.
    pub fn set(&self, value: T) {
        let snapshot = value.clone();
        *self.value.borrow_mut() = value;
        self.subscribers.notify(&snapshot);
    }

    /// Mutates the value in place, then notifies subscribers with the result.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let (result, snapshot) = {
            let mut value = self.value.borrow_mut();
            let result = f(&mut value);
            (result, value.clone())
        };
        self.subscribers.notify(&snapshot);
        result
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        self.subscribers.add(callback)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.value.borrow())
            .field("subscribers", &self.subscribers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_reaches_every_subscriber() {
        let subs: Subscribers<u32> = Subscribers::new();
        let seen_a = Rc::new(RefCell::new(Vec::new()));
        let seen_b = Rc::new(RefCell::new(Vec::new()));

        let a = Rc::clone(&seen_a);
        let _sa = subs.add(move |v| a.borrow_mut().push(*v));
        let b = Rc::clone(&seen_b);
        let _sb = subs.add(move |v| b.borrow_mut().push(*v * 10));

        subs.notify(&1);
        subs.notify(&2);

        assert_eq!(*seen_a.borrow(), vec![1, 2]);
        assert_eq!(*seen_b.borrow(), vec![10, 20]);
    }

    #[test]
    fn unsubscribe_removes_only_that_callback() {
        let subs: Subscribers<u32> = Subscribers::new();
        let count_a = Rc::new(RefCell::new(0));
        let count_b = Rc::new(RefCell::new(0));

        let a = Rc::clone(&count_a);
        let sa = subs.add(move |_| *a.borrow_mut() += 1);
        let b = Rc::clone(&count_b);
        let _sb = subs.add(move |_| *b.borrow_mut() += 1);

        subs.notify(&0);
        sa.unsubscribe();
        subs.notify(&0);

        assert_eq!(*count_a.borrow(), 1);
        assert_eq!(*count_b.borrow(), 2);
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn dropping_a_subscription_removes_the_callback() {
        let subs: Subscribers<u32> = Subscribers::new();
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        {
            let _scoped = subs.add(move |_| *c.borrow_mut() += 1);
            subs.notify(&0);
        }

        subs.notify(&0);
        assert_eq!(*count.borrow(), 1);
        assert!(subs.is_empty());
    }

    #[test]
    fn detached_callback_stays_until_cleared() {
        let subs: Subscribers<u32> = Subscribers::new();
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        subs.add(move |_| *c.borrow_mut() += 1).detach();

        subs.notify(&0);
        subs.notify(&0);
        assert_eq!(*count.borrow(), 2);

        subs.clear();
        subs.notify(&0);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn subscriptions_are_inert_after_clear() {
        let subs: Subscribers<u32> = Subscribers::new();
        let sub = subs.add(|_| {});
        subs.clear();
        assert!(subs.is_empty());
        sub.unsubscribe();

        let sub = {
            let scoped: Subscribers<u32> = Subscribers::new();
            scoped.add(|_| {})
        };
        sub.unsubscribe();
    }

    #[test]
    fn clearing_a_callback_that_owns_a_subscription() {
        let subs: Subscribers<u32> = Subscribers::new();
        let inner = subs.add(|_| {});
        let _outer = subs.add(move |_| {
            let _keep = &inner;
        });

        subs.clear();
        assert!(subs.is_empty());
    }

    #[test]
    fn observable_set_replaces_and_notifies() {
        let obs = Observable::new(vec![1]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = obs.subscribe(move |v: &Vec<i32>| s.borrow_mut().push(v.len()));

        obs.set(vec![1, 2, 3]);
        assert_eq!(obs.get(), vec![1, 2, 3]);
        assert_eq!(obs.with(|v| v.len()), 3);
        assert_eq!(*seen.borrow(), vec![3]);
    }

    #[test]
    fn observable_update_notifies_with_new_value() {
        let obs = Observable::new(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = obs.subscribe(move |v| s.borrow_mut().push(*v));

        let old = obs.update(|v| {
            let old = *v;
            *v += 1;
            old
        });
        assert_eq!(old, 1);
        assert_eq!(obs.get(), 2);
        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[test]
    fn observable_clones_share_state() {
        let obs = Observable::new(false);
        let other = obs.clone();
        other.set(true);
        assert!(obs.get());
    }

    #[test]
    fn subscriber_may_read_the_observable_it_watches() {
        let obs = Observable::new(0);
        let reader = obs.clone();
        let seen = Rc::new(RefCell::new(0));
        let s = Rc::clone(&seen);
        let _sub = obs.subscribe(move |_| *s.borrow_mut() = reader.get());

        obs.set(7);
        assert_eq!(*seen.borrow(), 7);
    }

    #[test]
    fn reentrant_notification_is_skipped() {
        let subs: Subscribers<u32> = Subscribers::new();
        let inner = subs.clone();
        let calls = Rc::new(RefCell::new(0));
        let c = Rc::clone(&calls);
        let _sub = subs.add(move |v| {
            *c.borrow_mut() += 1;
            if *v == 0 {
                inner.notify(&1);
            }
        });

        subs.notify(&0);
        assert_eq!(*calls.borrow(), 1);
    }
}
