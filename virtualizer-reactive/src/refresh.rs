use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use virtualizer::{VirtualItem, Virtualizer, WeakVirtualizer};

use crate::frame::FrameId;
use crate::runtime::Runtime;
use crate::signal::{ReadSignal, Signal};

/// Lifecycle of one adapter instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdapterState {
    /// Created, not mounted yet.
    Unattached,
    /// Mounted, mirror in sync with the last flush.
    Idle,
    /// Mounted, a flush is scheduled for the next frame.
    FlushPending,
    /// Unmounted. No further flushes happen.
    Detached,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Unattached,
    Attached,
    Detached,
}

/// The engine outputs, as reactive state. Written only by [`RefreshScheduler`].
pub(crate) struct Mirror<E> {
    pub(crate) total_size: Signal<u64>,
    pub(crate) virtual_items: Signal<Vec<VirtualItem<E>>>,
}

impl<E: 'static> Mirror<E> {
    pub(crate) fn total_size(&self) -> ReadSignal<u64> {
        self.total_size.read_only()
    }

    pub(crate) fn virtual_items(&self) -> ReadSignal<Vec<VirtualItem<E>>> {
        self.virtual_items.read_only()
    }
}

impl<E> Clone for Mirror<E> {
    fn clone(&self) -> Self {
        Self {
            total_size: self.total_size.clone(),
            virtual_items: self.virtual_items.clone(),
        }
    }
}

/// Turns engine change notifications into at most one mirror update per frame.
pub(crate) struct RefreshScheduler<S, E> {
    rt: Runtime,
    lifecycle: Cell<Lifecycle>,
    pending: Cell<Option<FrameId>>,
    source: RefCell<Option<(WeakVirtualizer<S, E>, Mirror<E>)>>,
    flushes: Cell<u64>,
}

impl<S, E> RefreshScheduler<S, E>
where
    S: Clone + PartialEq + 'static,
    E: 'static,
{
    pub(crate) fn new(rt: &Runtime) -> Rc<Self> {
        Rc::new(Self {
            rt: rt.clone(),
            lifecycle: Cell::new(Lifecycle::Unattached),
            pending: Cell::new(None),
            source: RefCell::new(None),
            flushes: Cell::new(0),
        })
    }

    pub(crate) fn bind(&self, engine: &Virtualizer<S, E>, mirror: Mirror<E>) {
        *self.source.borrow_mut() = Some((engine.downgrade(), mirror));
    }

    /// Requests a flush on the next frame unless one is already pending.
    pub(crate) fn schedule(self: &Rc<Self>) {
        if self.lifecycle.get() == Lifecycle::Detached {
            vtrace!("schedule ignored: detached");
            return;
        }
        if self.pending.get().is_some() {
            vtrace!("schedule coalesced");
            return;
        }
        let weak = Rc::downgrade(self);
        let id = self.rt.request_frame(move || {
            if let Some(scheduler) = weak.upgrade() {
                scheduler.flush();
            }
        });
        vtrace!(frame = id, "flush scheduled");
        self.pending.set(Some(id));
    }

    fn flush(&self) {
        self.pending.set(None);
        if self.lifecycle.get() == Lifecycle::Detached {
            return;
        }
        let (engine, mirror) = match &*self.source.borrow() {
            Some((engine, mirror)) => (engine.upgrade(), mirror.clone()),
            None => return,
        };
        let Some(engine) = engine else {
            return;
        };
        let total_size = engine.get_total_size();
        let virtual_items = engine.get_virtual_items();
        self.flushes.set(self.flushes.get() + 1);
        vtrace!(total_size, items = virtual_items.len(), "flush");
        self.rt.batch(|| {
            mirror.total_size.set_if_changed(total_size);
            mirror.virtual_items.set_if_changed(virtual_items);
        });
    }

    pub(crate) fn attach(&self) {
        if self.lifecycle.get() == Lifecycle::Unattached {
            vdebug!("adapter attached");
            self.lifecycle.set(Lifecycle::Attached);
        }
    }

    /// Cancels the pending flush, if any. Later notifications are ignored.
    pub(crate) fn detach(&self) {
        if self.lifecycle.replace(Lifecycle::Detached) == Lifecycle::Detached {
            return;
        }
        if let Some(id) = self.pending.take() {
            vtrace!(frame = id, "pending flush cancelled");
            self.rt.cancel_frame(id);
        }
        vdebug!("adapter detached");
    }
}

impl<S, E> RefreshScheduler<S, E> {
    pub(crate) fn state(&self) -> AdapterState {
        match (self.lifecycle.get(), self.pending.get()) {
            (Lifecycle::Unattached, _) => AdapterState::Unattached,
            (Lifecycle::Attached, None) => AdapterState::Idle,
            (Lifecycle::Attached, Some(_)) => AdapterState::FlushPending,
            (Lifecycle::Detached, _) => AdapterState::Detached,
        }
    }

    pub(crate) fn flush_count(&self) -> u64 {
        self.flushes.get()
    }
}

impl<S, E> fmt::Debug for RefreshScheduler<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("state", &self.state())
            .field("flushes", &self.flushes.get())
            .finish_non_exhaustive()
    }
}
