use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::runtime::{Computation, Phase, Runtime};
use crate::signal::{ReadSignal, Signal};

#[derive(Default)]
struct Owned {
    children: Vec<Rc<ScopeInner>>,
    computations: Vec<Rc<Computation>>,
    cleanups: Vec<Box<dyn FnOnce()>>,
}

pub(crate) struct ScopeInner {
    parent: Weak<ScopeInner>,
    owned: RefCell<Owned>,
    disposed: Cell<bool>,
}

impl ScopeInner {
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    fn dispose_tree(self: &Rc<Self>) {
        if self.disposed.replace(true) {
            return;
        }
        let Owned {
            children,
            computations,
            cleanups,
        } = core::mem::take(&mut *self.owned.borrow_mut());
        for child in children.iter().rev() {
            child.dispose_tree();
        }
        for computation in computations {
            computation.dispose();
        }
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
        if let Some(parent) = self.parent.upgrade() {
            parent
                .owned
                .borrow_mut()
                .children
                .retain(|child| !Rc::ptr_eq(child, self));
        }
    }
}

/// An owner of computations, cleanups and child scopes.
///
/// Disposing a scope disposes its children first, stops its computations and then runs
/// its cleanups in reverse registration order.
#[derive(Clone)]
pub struct Scope {
    rt: Runtime,
    inner: Rc<ScopeInner>,
}

impl Scope {
    pub(crate) fn root(rt: &Runtime) -> Self {
        Self {
            rt: rt.clone(),
            inner: Rc::new(ScopeInner {
                parent: Weak::new(),
                owned: RefCell::new(Owned::default()),
                disposed: Cell::new(false),
            }),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    pub fn child(&self) -> Scope {
        let inner = Rc::new(ScopeInner {
            parent: Rc::downgrade(&self.inner),
            owned: RefCell::new(Owned::default()),
            disposed: Cell::new(self.inner.is_disposed()),
        });
        if !self.inner.is_disposed() {
            self.inner
                .owned
                .borrow_mut()
                .children
                .push(Rc::clone(&inner));
        }
        Scope {
            rt: self.rt.clone(),
            inner,
        }
    }

    pub fn dispose(&self) {
        self.rt.batch(|| self.inner.dispose_tree());
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Registers `f` to run when this scope is disposed. Runs it immediately when the scope
    /// is already disposed.
    pub fn on_cleanup(&self, f: impl FnOnce() + 'static) {
        if self.inner.is_disposed() {
            f();
            return;
        }
        self.inner.owned.borrow_mut().cleanups.push(Box::new(f));
    }

    /// Queues `f` to run after the current update has committed (every queued computation
    /// settled). Dropped when the scope is disposed first.
    pub fn on_mount(&self, f: impl FnOnce() + 'static) {
        if self.inner.is_disposed() {
            return;
        }
        self.rt
            .inner
            .enqueue_mount(Rc::downgrade(&self.inner), Box::new(f));
        self.rt.inner.maybe_flush();
    }

    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.rt.batch(f)
    }

    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        self.rt.untrack(f)
    }

    pub fn create_signal<T: 'static>(&self, value: T) -> Signal<T> {
        Signal::new(&self.rt, value)
    }

    /// A derived value that re-computes when its dependencies change and notifies only when
    /// the result differs.
    pub fn create_memo<T: PartialEq + 'static>(
        &self,
        f: impl FnMut() -> T + 'static,
    ) -> ReadSignal<T> {
        self.create_memo_with(f, T::eq)
    }

    /// Like [`Self::create_memo`] with a custom equality. `|_, _| false` propagates every
    /// re-computation.
    pub fn create_memo_with<T: 'static>(
        &self,
        mut f: impl FnMut() -> T + 'static,
        equals: impl Fn(&T, &T) -> bool + 'static,
    ) -> ReadSignal<T> {
        let computation = self.rt.inner.new_computation(Phase::Render);
        let initial = self.rt.inner.tracked(&computation, &mut f);
        let signal = Signal::new(&self.rt, initial);
        let slot = signal.clone();
        computation.set_body(Box::new(move || {
            let next = f();
            if !slot.with_untracked(|current| equals(current, &next)) {
                slot.set(next);
            }
        }));
        self.own(computation);
        signal.read_only()
    }

    /// A computation that runs immediately and re-runs, in the render phase, whenever what
    /// it read changes.
    pub fn create_render_effect(&self, f: impl FnMut() + 'static) {
        let computation = self.rt.inner.new_computation(Phase::Render);
        computation.set_body(Box::new(f));
        self.own(Rc::clone(&computation));
        self.rt.inner.batch(|| self.rt.inner.run(&computation));
    }

    /// A computation that runs after the current update's render phase, and again after
    /// every later update that changed what it read.
    pub fn create_effect(&self, f: impl FnMut() + 'static) {
        let computation = self.rt.inner.new_computation(Phase::Effect);
        computation.set_body(Box::new(f));
        self.own(Rc::clone(&computation));
        self.rt.inner.enqueue(computation);
        self.rt.inner.maybe_flush();
    }

    fn own(&self, computation: Rc<Computation>) {
        if self.inner.is_disposed() {
            computation.dispose();
            return;
        }
        self.inner.owned.borrow_mut().computations.push(computation);
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("disposed", &self.inner.is_disposed())
            .finish_non_exhaustive()
    }
}
