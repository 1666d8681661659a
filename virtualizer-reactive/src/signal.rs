use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::runtime::{Computation, Runtime, RuntimeInner};

struct Subscriber {
    computation: Weak<Computation>,
    epoch: u64,
}

struct SignalState<T> {
    rt: Weak<RuntimeInner>,
    value: RefCell<T>,
    subscribers: RefCell<Vec<Subscriber>>,
}

/// A reactive cell. Reads inside a computation subscribe it; writes re-run subscribers.
pub struct Signal<T> {
    state: Rc<SignalState<T>>,
}

/// Read half of a [`Signal`].
pub struct ReadSignal<T> {
    signal: Signal<T>,
}

impl<T: 'static> Signal<T> {
    pub fn new(rt: &Runtime, value: T) -> Self {
        Self {
            state: Rc::new(SignalState {
                rt: Rc::downgrade(&rt.inner),
                value: RefCell::new(value),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Subscribes the running computation, if any, without reading the value.
    pub fn track(&self) {
        let Some(rt) = self.state.rt.upgrade() else {
            return;
        };
        let Some(observer) = rt.observer() else {
            return;
        };
        let epoch = observer.epoch();
        let mut subscribers = self.state.subscribers.borrow_mut();
        // Drop entries left behind by earlier runs and disposed computations, so the list
        // holds at most one entry per live reader.
        subscribers.retain(|s| {
            s.computation
                .upgrade()
                .is_some_and(|computation| computation.is_current(s.epoch))
        });
        let already = subscribers
            .iter()
            .any(|s| s.epoch == epoch && s.computation.as_ptr() == Rc::as_ptr(&observer));
        if !already {
            subscribers.push(Subscriber {
                computation: Rc::downgrade(&observer),
                epoch,
            });
        }
    }

    /// Reads the value by reference (tracked).
    ///
    /// Writing this signal from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.state.value.borrow())
    }

    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state.value.borrow())
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.with_untracked(T::clone)
    }

    pub fn set(&self, value: T) {
        let old = self.state.value.replace(value);
        drop(old);
        self.notify();
    }

    /// Writes `value` only when it differs from the current one. Returns whether it did.
    pub fn set_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        if *self.state.value.borrow() == value {
            return false;
        }
        self.set(value);
        true
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.state.value.borrow_mut());
        self.notify();
    }

    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            signal: self.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.state.subscribers.borrow().len()
    }

    fn notify(&self) {
        let Some(rt) = self.state.rt.upgrade() else {
            return;
        };
        let subscribers = core::mem::take(&mut *self.state.subscribers.borrow_mut());
        for subscriber in subscribers {
            if let Some(computation) = subscriber.computation.upgrade() {
                if computation.is_current(subscriber.epoch) {
                    rt.enqueue(computation);
                }
            }
        }
        rt.maybe_flush();
    }
}

impl<T: 'static> ReadSignal<T> {
    pub fn track(&self) {
        self.signal.track();
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with_untracked(f)
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.signal.get()
    }

    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.signal.get_untracked()
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.value.try_borrow() {
            Ok(value) => f.debug_tuple("Signal").field(&*value).finish(),
            Err(_) => f.write_str("Signal(<borrowed>)"),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.signal, f)
    }
}
