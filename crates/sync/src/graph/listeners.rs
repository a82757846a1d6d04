use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type ListenerResult = Result<(), ListenerError>;

/// Handle returned by a subscription; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Ordered subscriber list for one event kind.
///
/// Every listener is isolated: an `Err` return or a panic is logged and
/// counted, and notification continues with the next listener.
pub struct Listeners<T: ?Sized> {
    label: &'static str,
    entries: Vec<(SubscriptionId, Box<dyn FnMut(&T) -> ListenerResult>)>,
}

impl<T: ?Sized> std::fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("label", &self.label)
            .field("count", &self.entries.len())
            .finish()
    }
}

impl<T: ?Sized> Listeners<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            entries: Vec::new(),
        }
    }

    pub fn insert<F>(&mut self, id: SubscriptionId, listener: F)
    where
        F: FnMut(&T) -> ListenerResult + 'static,
    {
        self.entries.push((id, Box::new(listener)));
    }

    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Calls every listener in registration order. Returns the number of
    /// listeners that failed.
    pub fn notify(&mut self, payload: &T) -> usize {
        let mut failures = 0;
        for (id, callback) in &mut self.entries {
            if !invoke(self.label, *id, callback, payload) {
                failures += 1;
            }
        }
        failures
    }

    /// Calls a single listener. Returns false if it failed or is unknown.
    pub fn notify_one(&mut self, id: SubscriptionId, payload: &T) -> bool {
        let label = self.label;
        match self.entries.iter_mut().find(|(entry_id, _)| *entry_id == id) {
            Some((_, callback)) => invoke(label, id, callback, payload),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn invoke<T: ?Sized>(
    label: &str,
    id: SubscriptionId,
    callback: &mut Box<dyn FnMut(&T) -> ListenerResult>,
    payload: &T,
) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| callback(payload))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::warn!("{} listener {:?} failed: {}", label, id, e);
            false
        }
        Err(panic) => {
            log::warn!(
                "{} listener {:?} panicked: {}",
                label,
                id,
                panic_message(panic.as_ref())
            );
            false
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn notifies_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners: Listeners<u32> = Listeners::new("test");

        for (i, tag) in ["first", "second", "third"].into_iter().enumerate() {
            let seen = seen.clone();
            listeners.insert(SubscriptionId(i as u64), move |v: &u32| {
                seen.borrow_mut().push((tag, *v));
                Ok(())
            });
        }

        assert_eq!(listeners.notify(&5), 0);
        assert_eq!(
            *seen.borrow(),
            vec![("first", 5), ("second", 5), ("third", 5)]
        );
    }

    #[test]
    fn failing_listener_does_not_block_others() {
        let calls = Rc::new(RefCell::new(0));
        let mut listeners: Listeners<str> = Listeners::new("test");

        listeners.insert(SubscriptionId(1), |_: &str| Err(ListenerError::new("boom")));
        listeners.insert(SubscriptionId(2), |_: &str| panic!("listener exploded"));
        let counter = calls.clone();
        listeners.insert(SubscriptionId(3), move |_: &str| {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        assert_eq!(listeners.notify("payload"), 2);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn remove_stops_delivery() {
        let calls = Rc::new(RefCell::new(0));
        let mut listeners: Listeners<()> = Listeners::new("test");
        let counter = calls.clone();
        listeners.insert(SubscriptionId(9), move |_: &()| {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        listeners.notify(&());
        assert!(listeners.remove(SubscriptionId(9)));
        assert!(!listeners.remove(SubscriptionId(9)));
        listeners.notify(&());

        assert_eq!(*calls.borrow(), 1);
        assert!(listeners.is_empty());
    }
}
