//! Typed, single-threaded observer
//!
//! Every observable piece of harness state (models, the mode switch, the
//! message log, the task manager) owns an [`Emitter`]. Subscribing returns a
//! [`Subscription`] that unsubscribes when dropped, so tearing down the
//! owner of a subscription is enough to stop notifications.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

type Handler<E> = Rc<dyn Fn(&E)>;

struct EmitterInner<E> {
    next_id: Cell<u64>,
    handlers: RefCell<Vec<(u64, Handler<E>)>>,
}

impl<E> EmitterInner<E> {
    fn is_subscribed(&self, id: u64) -> bool {
        self.handlers.borrow().iter().any(|(hid, _)| *hid == id)
    }
}

/// Broadcasts events of type `E` to its subscribers, in subscription order.
pub struct Emitter<E> {
    inner: Rc<EmitterInner<E>>,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: 'static> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> Emitter<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(EmitterInner {
                next_id: Cell::new(0),
                handlers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&E) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .handlers
            .borrow_mut()
            .push((id, Rc::new(handler)));

        let weak: Weak<EmitterInner<E>> = Rc::downgrade(&self.inner);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.handlers.borrow_mut().retain(|(hid, _)| *hid != id);
                }
            })),
        }
    }

    /// Deliver `event`. Handlers may subscribe or unsubscribe while the event
    /// is being delivered; handlers removed mid-delivery are skipped.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<(u64, Handler<E>)> = self.inner.handlers.borrow().clone();
        for (id, handler) in snapshot {
            if self.inner.is_subscribed(id) {
                handler(event);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.borrow().len()
    }
}

/// Scoped subscription handle.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Keep the handler registered for the emitter's whole lifetime.
    pub fn forget(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_subscribers_in_order() {
        let emitter: Emitter<u32> = Emitter::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s1 = seen.clone();
        let _a = emitter.subscribe(move |e| s1.borrow_mut().push(("a", *e)));
        let s2 = seen.clone();
        let _b = emitter.subscribe(move |e| s2.borrow_mut().push(("b", *e)));

        emitter.emit(&7);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let emitter: Emitter<()> = Emitter::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let sub = emitter.subscribe(move |_| h.set(h.get() + 1));
        emitter.emit(&());
        drop(sub);
        emitter.emit(&());
        assert_eq!(hits.get(), 1);
        assert_eq!(emitter.subscriber_count(), 0);
    }

    #[test]
    fn test_forget_keeps_handler() {
        let emitter: Emitter<()> = Emitter::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        emitter.subscribe(move |_| h.set(h.get() + 1)).forget();
        emitter.emit(&());
        emitter.emit(&());
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_unsubscribe_during_emit_skips_handler() {
        let emitter: Emitter<()> = Emitter::new();
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let hits = Rc::new(Cell::new(0));

        let v = victim.clone();
        let _killer = emitter.subscribe(move |_| {
            v.borrow_mut().take();
        });
        let h = hits.clone();
        *victim.borrow_mut() = Some(emitter.subscribe(move |_| h.set(h.get() + 1)));

        emitter.emit(&());
        assert_eq!(hits.get(), 0);
    }
}
