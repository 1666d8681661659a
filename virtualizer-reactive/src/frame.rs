use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

/// Identifies a frame request so it can be cancelled.
pub type FrameId = u64;

/// A source of display-refresh ticks.
///
/// Requested callbacks run once, on the next tick, outside of any reactive batch.
pub trait FrameScheduler {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> FrameId;

    /// Cancels a request. Unknown or already-run ids are ignored.
    fn cancel_frame(&self, id: FrameId);
}

/// A headless, manually ticked [`FrameScheduler`].
///
/// Embedders without a real display loop (tests, terminal frontends) drive it by calling
/// [`FrameClock::tick`] once per frame.
#[derive(Clone, Default)]
pub struct FrameClock {
    queue: Rc<RefCell<FrameQueue>>,
}

#[derive(Default)]
struct FrameQueue {
    next_id: FrameId,
    callbacks: Vec<(FrameId, Box<dyn FnOnce()>)>,
    frames: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every callback requested before this call and returns how many ran.
    ///
    /// Callbacks requested while ticking are deferred to the next tick.
    pub fn tick(&self) -> usize {
        let callbacks = {
            let mut queue = self.queue.borrow_mut();
            queue.frames += 1;
            core::mem::take(&mut queue.callbacks)
        };
        let ran = callbacks.len();
        for (_, callback) in callbacks {
            callback();
        }
        ran
    }

    /// Number of callbacks waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.queue.borrow().callbacks.len()
    }

    /// Number of ticks so far.
    pub fn frame_count(&self) -> u64 {
        self.queue.borrow().frames
    }
}

impl FrameScheduler for FrameClock {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> FrameId {
        let mut queue = self.queue.borrow_mut();
        queue.next_id += 1;
        let id = queue.next_id;
        queue.callbacks.push((id, callback));
        id
    }

    fn cancel_frame(&self, id: FrameId) {
        self.queue.borrow_mut().callbacks.retain(|(queued, _)| *queued != id);
    }
}

impl fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.queue.borrow();
        f.debug_struct("FrameClock")
            .field("pending", &queue.callbacks.len())
            .field("frames", &queue.frames)
            .finish()
    }
}
