use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Deref;

use virtualizer::{VirtualItem, VirtualWindow, Virtualizer};

use crate::refresh::{AdapterState, RefreshScheduler};
use crate::signal::ReadSignal;

/// An engine whose outputs are reactive.
///
/// Every engine operation is available through `Deref`. Only [`Self::get_total_size`] and
/// [`Self::get_virtual_items`] differ: they read the mirrored state, so calling them inside a
/// computation subscribes it to the next flush.
pub struct ReactiveVirtualizer<S, E> {
    instance: Virtualizer<S, E>,
    total_size: ReadSignal<u64>,
    virtual_items: ReadSignal<Vec<VirtualItem<E>>>,
    refresh: Rc<RefreshScheduler<S, E>>,
}

impl<S, E: 'static> ReactiveVirtualizer<S, E> {
    pub(crate) fn new(
        instance: Virtualizer<S, E>,
        total_size: ReadSignal<u64>,
        virtual_items: ReadSignal<Vec<VirtualItem<E>>>,
        refresh: Rc<RefreshScheduler<S, E>>,
    ) -> Self {
        Self {
            instance,
            total_size,
            virtual_items,
            refresh,
        }
    }

    /// Total extent as of the last flush (tracked).
    pub fn get_total_size(&self) -> u64 {
        self.total_size.get()
    }

    /// Window descriptors as of the last flush (tracked).
    pub fn get_virtual_items(&self) -> Vec<VirtualItem<E>> {
        self.virtual_items.get()
    }

    /// The underlying engine, for reads that must see its live state.
    pub fn engine(&self) -> &Virtualizer<S, E> {
        &self.instance
    }

    pub fn state(&self) -> AdapterState {
        self.refresh.state()
    }

    /// Number of flushes that wrote the mirror so far.
    pub fn flush_count(&self) -> u64 {
        self.refresh.flush_count()
    }

    pub fn total_size_signal(&self) -> ReadSignal<u64> {
        self.total_size.clone()
    }

    pub fn virtual_items_signal(&self) -> ReadSignal<Vec<VirtualItem<E>>> {
        self.virtual_items.clone()
    }
}

impl<S, E> Deref for ReactiveVirtualizer<S, E> {
    type Target = Virtualizer<S, E>;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl<S, E: 'static> VirtualWindow<E> for ReactiveVirtualizer<S, E> {
    fn get_total_size(&self) -> u64 {
        ReactiveVirtualizer::get_total_size(self)
    }

    fn get_virtual_items(&self) -> Vec<VirtualItem<E>> {
        ReactiveVirtualizer::get_virtual_items(self)
    }
}

impl<S, E> Clone for ReactiveVirtualizer<S, E> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance.clone(),
            total_size: self.total_size.clone(),
            virtual_items: self.virtual_items.clone(),
            refresh: Rc::clone(&self.refresh),
        }
    }
}

impl<S, E> fmt::Debug for ReactiveVirtualizer<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveVirtualizer")
            .field("instance", &self.instance)
            .field("total_size", &self.total_size)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}
