use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::rc::{Rc, Weak};
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::frame::{FrameId, FrameScheduler};
use crate::scope::{Scope, ScopeInner};

/// When a computation re-runs relative to the others queued by the same change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Memos and render effects: run first, in creation order.
    Render,
    /// User effects: run after every render-phase computation settled.
    Effect,
}

/// A tracked closure.
///
/// Every run bumps `epoch`; subscriptions recorded under an older epoch are stale.
pub(crate) struct Computation {
    id: u64,
    phase: Phase,
    epoch: Cell<u64>,
    queued: Cell<bool>,
    disposed: Cell<bool>,
    body: RefCell<Option<Box<dyn FnMut()>>>,
}

impl Computation {
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        !self.disposed.get() && self.epoch.get() == epoch
    }

    pub(crate) fn set_body(&self, body: Box<dyn FnMut()>) {
        if !self.disposed.get() {
            *self.body.borrow_mut() = Some(body);
        }
    }

    pub(crate) fn dispose(&self) {
        self.disposed.set(true);
        let body = self.body.borrow_mut().take();
        drop(body);
    }
}

struct MountTask {
    owner: Weak<ScopeInner>,
    task: Box<dyn FnOnce()>,
}

pub(crate) struct RuntimeInner {
    frames: Rc<dyn FrameScheduler>,
    observer: RefCell<Option<Rc<Computation>>>,
    next_id: Cell<u64>,
    render_queue: RefCell<BTreeMap<u64, Rc<Computation>>>,
    effect_queue: RefCell<BTreeMap<u64, Rc<Computation>>>,
    mounts: RefCell<VecDeque<MountTask>>,
    batch_depth: Cell<usize>,
    flushing: Cell<bool>,
}

impl RuntimeInner {
    pub(crate) fn observer(&self) -> Option<Rc<Computation>> {
        self.observer.borrow().clone()
    }

    pub(crate) fn new_computation(&self, phase: Phase) -> Rc<Computation> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Rc::new(Computation {
            id,
            phase,
            epoch: Cell::new(0),
            queued: Cell::new(false),
            disposed: Cell::new(false),
            body: RefCell::new(None),
        })
    }

    /// Runs `f` with `computation` as the observer, starting a new subscription epoch.
    pub(crate) fn tracked<R>(&self, computation: &Rc<Computation>, f: impl FnOnce() -> R) -> R {
        computation.epoch.set(computation.epoch.get() + 1);
        let _observer = self.swap_observer(Some(Rc::clone(computation)));
        f()
    }

    pub(crate) fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _observer = self.swap_observer(None);
        f()
    }

    fn swap_observer(&self, observer: Option<Rc<Computation>>) -> ObserverGuard<'_> {
        ObserverGuard {
            slot: &self.observer,
            prev: self.observer.replace(observer),
        }
    }

    /// Re-runs a computation's body. A body that is already running is skipped.
    pub(crate) fn run(&self, computation: &Rc<Computation>) {
        if computation.disposed.get() {
            return;
        }
        let Some(mut body) = computation.body.borrow_mut().take() else {
            return;
        };
        self.tracked(computation, || body());
        computation.set_body(body);
    }

    pub(crate) fn enqueue(&self, computation: Rc<Computation>) {
        if computation.disposed.get() || computation.queued.replace(true) {
            return;
        }
        let queue = match computation.phase {
            Phase::Render => &self.render_queue,
            Phase::Effect => &self.effect_queue,
        };
        queue.borrow_mut().insert(computation.id, computation);
    }

    pub(crate) fn enqueue_mount(&self, owner: Weak<ScopeInner>, task: Box<dyn FnOnce()>) {
        self.mounts.borrow_mut().push_back(MountTask { owner, task });
    }

    pub(crate) fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let depth = self.batch_depth.get();
        self.batch_depth.set(depth + 1);
        let out = {
            let _depth = Restore {
                cell: &self.batch_depth,
                value: depth,
            };
            f()
        };
        self.maybe_flush();
        out
    }

    pub(crate) fn maybe_flush(&self) {
        if self.batch_depth.get() == 0 && !self.flushing.get() {
            self.flush();
        }
    }

    /// Drains render computations, then effects, then mount tasks, until all queues are empty.
    fn flush(&self) {
        self.flushing.set(true);
        let _flushing = Restore {
            cell: &self.flushing,
            value: false,
        };
        loop {
            if let Some(computation) = pop_first(&self.render_queue) {
                computation.queued.set(false);
                self.run(&computation);
                continue;
            }
            if let Some(computation) = pop_first(&self.effect_queue) {
                computation.queued.set(false);
                self.run(&computation);
                continue;
            }
            let mount = self.mounts.borrow_mut().pop_front();
            if let Some(MountTask { owner, task }) = mount {
                match owner.upgrade() {
                    Some(owner) if !owner.is_disposed() => self.untracked(task),
                    _ => {
                        vtrace!("mount task skipped: owner disposed");
                    }
                }
                continue;
            }
            break;
        }
    }
}

/// Puts `value` back into `cell` on drop, unwinding included.
struct Restore<'a, T: Copy> {
    cell: &'a Cell<T>,
    value: T,
}

impl<T: Copy> Drop for Restore<'_, T> {
    fn drop(&mut self) {
        self.cell.set(self.value);
    }
}

struct ObserverGuard<'a> {
    slot: &'a RefCell<Option<Rc<Computation>>>,
    prev: Option<Rc<Computation>>,
}

impl Drop for ObserverGuard<'_> {
    fn drop(&mut self) {
        self.slot.replace(self.prev.take());
    }
}

fn pop_first(queue: &RefCell<BTreeMap<u64, Rc<Computation>>>) -> Option<Rc<Computation>> {
    queue.borrow_mut().pop_first().map(|(_, computation)| computation)
}

/// Handle to a reactive runtime.
///
/// Signal writes outside a batch propagate synchronously: memos and render effects re-run
/// first in creation order, then effects, then the post-commit mount queue.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(frames: impl FrameScheduler + 'static) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                frames: Rc::new(frames),
                observer: RefCell::new(None),
                next_id: Cell::new(0),
                render_queue: RefCell::new(BTreeMap::new()),
                effect_queue: RefCell::new(BTreeMap::new()),
                mounts: RefCell::new(VecDeque::new()),
                batch_depth: Cell::new(0),
                flushing: Cell::new(false),
            }),
        }
    }

    /// Creates a root scope and runs `f` in it. Mount tasks queued by `f` run before this
    /// returns.
    pub fn create_root<R>(&self, f: impl FnOnce(&Scope) -> R) -> (Scope, R) {
        let scope = Scope::root(self);
        let out = self.inner.batch(|| self.inner.untracked(|| f(&scope)));
        (scope, out)
    }

    /// Defers propagation of every signal write made by `f` until it returns.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.batch(f)
    }

    /// Runs `f` without recording signal reads as dependencies.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.untracked(f)
    }

    pub fn request_frame(&self, callback: impl FnOnce() + 'static) -> FrameId {
        self.inner.frames.request_frame(Box::new(callback))
    }

    pub fn cancel_frame(&self, id: FrameId) {
        self.inner.frames.cancel_frame(id);
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("batch_depth", &self.inner.batch_depth.get())
            .field("flushing", &self.inner.flushing.get())
            .finish_non_exhaustive()
    }
}

/// Builds a computation body that reads `deps` (tracked) and hands the value to `f`
/// (untracked).
///
/// With `defer`, the first run only records dependencies.
pub fn on<D, F>(
    rt: &Runtime,
    deps: impl Fn() -> D + 'static,
    mut f: F,
    defer: bool,
) -> impl FnMut() + 'static
where
    D: 'static,
    F: FnMut(D) + 'static,
{
    let rt = rt.clone();
    let mut first = true;
    move || {
        let value = deps();
        if core::mem::take(&mut first) && defer {
            return;
        }
        rt.untrack(|| f(value));
    }
}
