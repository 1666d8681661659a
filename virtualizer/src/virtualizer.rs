use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::{cmp, fmt, mem};

use crate::cache::MeasurementCache;
use crate::fenwick::Fenwick;
use crate::types::ReportSize;
use crate::{
    Align, Range, Rect, ScrollDirection, Size, Teardown, VirtualItem, VirtualRange,
    VirtualizerOptions, default_range_extractor,
};

/// Read access to the current window, shared by the engine and anything standing in for it.
pub trait VirtualWindow<E> {
    /// Padding plus the best-known size of every item.
    fn get_total_size(&self) -> u64;

    /// Descriptors for the items that should currently be rendered.
    fn get_virtual_items(&self) -> Vec<VirtualItem<E>>;
}

/// An imperative windowing engine.
///
/// `Virtualizer` is a cheap-to-clone handle: clones share the same state. It does not render
/// anything itself. The surrounding UI layer:
/// - calls [`Self::did_mount`] once its scroll container exists and keeps the returned teardown
/// - calls [`Self::will_update`] before committing a render
/// - renders [`Self::get_virtual_items`] and reports rendered elements through
///   [`VirtualItem::measure_element`]
///
/// Every state change is announced through `options.on_change`.
pub struct Virtualizer<S, E> {
    inner: Rc<Inner<S, E>>,
}

/// A non-owning reference to a [`Virtualizer`].
pub struct WeakVirtualizer<S, E> {
    inner: Weak<Inner<S, E>>,
}

struct Inner<S, E> {
    options: RefCell<VirtualizerOptions<S, E>>,
    state: RefCell<State>,
    mounted: Cell<bool>,
    scroll_element: RefCell<Option<S>>,
    unsubs: RefCell<Vec<Teardown>>,
    notify_depth: Cell<usize>,
    notify_pending: Cell<bool>,
    reporter: Rc<dyn ReportSize<E>>,
}

#[derive(Default)]
struct State {
    viewport: Rect,
    scroll_offset: u64,
    is_scrolling: bool,
    scroll_direction: Option<ScrollDirection>,
    sizes: Vec<u32>, // best-known sizes (no gap)
    measured: Vec<bool>,
    sums: Fenwick,
    cache: MeasurementCache,
}

impl State {
    fn total_size<S, E>(&self, options: &VirtualizerOptions<S, E>) -> u64 {
        if !options.enabled {
            return 0;
        }
        options.padding_start as u64 + self.sums.total() + options.padding_end as u64
    }

    fn item_start<S, E>(&self, options: &VirtualizerOptions<S, E>, index: usize) -> u64 {
        (options.scroll_margin as u64)
            .saturating_add(options.padding_start as u64)
            .saturating_add(self.sums.prefix_sum(index))
    }

    fn max_scroll_offset<S, E>(&self, options: &VirtualizerOptions<S, E>) -> u64 {
        let total = self.total_size(options);
        (options.scroll_margin as u64)
            .saturating_add(total.saturating_sub(self.viewport.main as u64))
    }

    fn index_at_offset_in_list<S, E>(
        &self,
        options: &VirtualizerOptions<S, E>,
        offset: u64,
    ) -> usize {
        let padding = options.padding_start as u64;
        if offset < padding {
            return 0;
        }
        self.sums
            .items_within(offset - padding)
            .min(options.count.saturating_sub(1))
    }

    fn visible_range<S, E>(&self, options: &VirtualizerOptions<S, E>) -> VirtualRange {
        let count = options.count.min(self.sizes.len());
        let view = self.viewport.main as u64;
        if !options.enabled || count == 0 || view == 0 {
            return VirtualRange::EMPTY;
        }

        let margin = options.scroll_margin as u64;
        let total = self.total_size(options);
        let offset = self.scroll_offset.min(self.max_scroll_offset(options));
        let end = offset.saturating_add(view);
        if end <= margin {
            return VirtualRange::EMPTY;
        }

        let start_in_list = offset.saturating_sub(margin);
        let last_in_list = (end - margin - 1).max(start_in_list);
        if start_in_list >= total {
            return VirtualRange {
                start_index: count,
                end_index: count,
            };
        }

        VirtualRange {
            start_index: self.index_at_offset_in_list(options, start_in_list),
            end_index: self.index_at_offset_in_list(options, last_in_list) + 1,
        }
    }

    fn set_scroll_offset(&mut self, offset: u64) -> bool {
        if self.scroll_offset == offset {
            return false;
        }
        self.scroll_direction = Some(if offset > self.scroll_offset {
            ScrollDirection::Forward
        } else {
            ScrollDirection::Backward
        });
        self.scroll_offset = offset;
        true
    }
}

/// Routes element measurements from descriptors back to the engine without keeping it alive.
struct Measurer<S, E> {
    engine: Weak<Inner<S, E>>,
}

impl<S, E> ReportSize<E> for Measurer<S, E>
where
    S: Clone + PartialEq + 'static,
    E: 'static,
{
    fn report(&self, index: usize, element: &E) {
        match self.engine.upgrade() {
            Some(inner) => Virtualizer { inner }.measure_element_at(index, element),
            None => {
                vtrace!(index, "measure_element: engine dropped");
            }
        }
    }
}

impl<S, E> Virtualizer<S, E>
where
    S: Clone + PartialEq + 'static,
    E: 'static,
{
    /// Creates an engine. `initial_rect` and `initial_offset` are applied immediately; no
    /// scroll container is observed until [`Self::did_mount`].
    pub fn new(options: VirtualizerOptions<S, E>) -> Self {
        vdebug!(
            count = options.count,
            enabled = options.enabled,
            overscan = options.overscan,
            horizontal = options.horizontal,
            "Virtualizer::new"
        );
        let state = State {
            viewport: options.initial_rect.unwrap_or_default(),
            scroll_offset: options.initial_offset.resolve(),
            ..State::default()
        };
        let inner = Rc::new_cyclic(|weak: &Weak<Inner<S, E>>| Inner {
            options: RefCell::new(options),
            state: RefCell::new(state),
            mounted: Cell::new(false),
            scroll_element: RefCell::new(None),
            unsubs: RefCell::new(Vec::new()),
            notify_depth: Cell::new(0),
            notify_pending: Cell::new(false),
            reporter: Rc::new(Measurer {
                engine: weak.clone(),
            }),
        });
        let v = Self { inner };
        v.rebuild_estimates();
        v
    }

    pub fn downgrade(&self) -> WeakVirtualizer<S, E> {
        WeakVirtualizer {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same engine.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A snapshot of the current options.
    pub fn options(&self) -> VirtualizerOptions<S, E> {
        self.inner.options.borrow().clone()
    }

    /// Replaces the whole option set.
    ///
    /// Item sizes are rebuilt only when `count`, `estimate_size` or `gap` changed; measured
    /// sizes are kept.
    pub fn set_options(&self, options: VirtualizerOptions<S, E>) {
        let prev = mem::replace(&mut *self.inner.options.borrow_mut(), options);
        vtrace!(count = self.count(), "Virtualizer::set_options");

        let (enabled, count, gap, estimate_size, initial_rect, initial_offset) = {
            let o = self.inner.options.borrow();
            (
                o.enabled,
                o.count,
                o.gap,
                Rc::clone(&o.estimate_size),
                o.initial_rect,
                o.initial_offset.clone(),
            )
        };

        if enabled && !prev.enabled {
            let mut st = self.inner.state.borrow_mut();
            st.viewport = initial_rect.unwrap_or_default();
            st.scroll_offset = initial_offset.resolve();
            st.is_scrolling = false;
            st.scroll_direction = None;
        }

        if count != prev.count || !Rc::ptr_eq(&estimate_size, &prev.estimate_size) {
            self.rebuild_estimates();
        } else if gap != prev.gap {
            self.rebuild_fenwick();
        }
        drop(prev);

        self.notify();
    }

    /// Clones the current options, applies `f`, then delegates to [`Self::set_options`].
    pub fn update_options(&self, f: impl FnOnce(&mut VirtualizerOptions<S, E>)) {
        let mut next = self.options();
        f(&mut next);
        self.set_options(next);
    }

    /// Batches multiple updates into a single `on_change` notification.
    pub fn batch_update(&self, f: impl FnOnce(&Self)) {
        let depth = self.inner.notify_depth.get();
        self.inner.notify_depth.set(depth + 1);

        f(self);

        let depth = self.inner.notify_depth.get();
        debug_assert!(depth > 0, "notify_depth underflow");
        self.inner.notify_depth.set(depth - 1);
        if depth == 1 && self.inner.notify_pending.replace(false) {
            self.notify_now();
        }
    }

    fn notify(&self) {
        if self.inner.notify_depth.get() > 0 {
            self.inner.notify_pending.set(true);
            return;
        }
        self.notify_now();
    }

    fn notify_now(&self) {
        let on_change = self.inner.options.borrow().on_change.clone();
        let is_scrolling = self.inner.state.borrow().is_scrolling;
        if let Some(cb) = on_change {
            cb(self, is_scrolling);
        }
    }

    /// Lifecycle hook: the UI has mounted.
    ///
    /// Starts observing the scroll container (if one is available) and returns the teardown
    /// that stops observation again.
    pub fn did_mount(&self) -> Teardown {
        vdebug!("Virtualizer::did_mount");
        self.inner.mounted.set(true);
        self.will_update();

        let weak = self.downgrade();
        Box::new(move || {
            if let Some(v) = weak.upgrade() {
                v.unmount();
            }
        })
    }

    /// Lifecycle hook: a render is about to be committed.
    ///
    /// Re-resolves the scroll container and, when it changed, moves observation over to the
    /// new one. Does nothing before [`Self::did_mount`].
    pub fn will_update(&self) {
        if !self.inner.mounted.get() {
            return;
        }

        let (enabled, get_scroll_element) = {
            let o = self.inner.options.borrow();
            (o.enabled, o.get_scroll_element.clone())
        };
        let next = match (enabled, get_scroll_element) {
            (true, Some(get)) => get(),
            _ => None,
        };
        if *self.inner.scroll_element.borrow() == next {
            return;
        }

        self.stop_observing();
        *self.inner.scroll_element.borrow_mut() = next.clone();
        let Some(element) = next else {
            vdebug!("will_update: scroll element detached");
            return;
        };
        vdebug!("will_update: observing new scroll element");

        let (horizontal, observe_rect, observe_offset, scroll_to) = {
            let o = self.inner.options.borrow();
            (
                o.horizontal,
                o.observe_element_rect.clone(),
                o.observe_element_offset.clone(),
                o.scroll_to_fn.clone(),
            )
        };

        if let Some(scroll_to) = scroll_to {
            scroll_to(&element, self.scroll_offset(), horizontal);
        }

        let mut unsubs = Vec::new();
        if let Some(observe) = observe_rect {
            let weak = self.downgrade();
            unsubs.push(observe(
                &element,
                Box::new(move |size| {
                    if let Some(v) = weak.upgrade() {
                        v.apply_scroll_rect(size);
                    }
                }),
            ));
        }
        if let Some(observe) = observe_offset {
            let weak = self.downgrade();
            unsubs.push(observe(
                &element,
                horizontal,
                Box::new(move |offset, is_scrolling| {
                    if let Some(v) = weak.upgrade() {
                        v.apply_scroll_offset(offset, is_scrolling);
                    }
                }),
            ));
        }
        self.inner.unsubs.borrow_mut().extend(unsubs);
    }

    fn unmount(&self) {
        vdebug!("Virtualizer: teardown");
        self.inner.mounted.set(false);
        self.stop_observing();
        *self.inner.scroll_element.borrow_mut() = None;
    }

    fn stop_observing(&self) {
        let unsubs = mem::take(&mut *self.inner.unsubs.borrow_mut());
        for unsub in unsubs {
            unsub();
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    /// The scroll container currently observed, if any.
    pub fn scroll_element(&self) -> Option<S> {
        self.inner.scroll_element.borrow().clone()
    }

    /// Applies a size reported by the scroll container.
    pub fn apply_scroll_rect(&self, size: Size) {
        let rect = Rect::from_size(size, self.inner.options.borrow().horizontal);
        {
            let mut st = self.inner.state.borrow_mut();
            if st.viewport == rect {
                return;
            }
            st.viewport = rect;
        }
        vtrace!(main = rect.main, cross = rect.cross, "apply_scroll_rect");
        self.notify();
    }

    /// Applies a scroll offset reported by the scroll container.
    pub fn apply_scroll_offset(&self, offset: u64, is_scrolling: bool) {
        {
            let mut st = self.inner.state.borrow_mut();
            let moved = st.set_scroll_offset(offset);
            if !moved && st.is_scrolling == is_scrolling {
                return;
            }
            st.is_scrolling = is_scrolling;
            if !is_scrolling {
                st.scroll_direction = None;
            }
        }
        vtrace!(offset, is_scrolling, "apply_scroll_offset");
        self.notify();
    }

    pub fn count(&self) -> usize {
        self.inner.options.borrow().count
    }

    pub fn scroll_offset(&self) -> u64 {
        self.inner.state.borrow().scroll_offset
    }

    pub fn scroll_rect(&self) -> Rect {
        self.inner.state.borrow().viewport
    }

    pub fn is_scrolling(&self) -> bool {
        self.inner.state.borrow().is_scrolling
    }

    pub fn scroll_direction(&self) -> Option<ScrollDirection> {
        self.inner.state.borrow().scroll_direction
    }

    pub fn get_total_size(&self) -> u64 {
        let o = self.inner.options.borrow();
        self.inner.state.borrow().total_size(&o)
    }

    pub fn visible_range(&self) -> VirtualRange {
        let o = self.inner.options.borrow();
        self.inner.state.borrow().visible_range(&o)
    }

    /// The visible range widened by `overscan`.
    pub fn virtual_range(&self) -> VirtualRange {
        let (mut range, overscan, count) = {
            let o = self.inner.options.borrow();
            (self.inner.state.borrow().visible_range(&o), o.overscan, o.count)
        };
        if range.is_empty() {
            return range;
        }
        range.start_index = range.start_index.saturating_sub(overscan);
        range.end_index = cmp::min(count, range.end_index.saturating_add(overscan));
        range
    }

    /// Indexes to render, as selected by the range extractor.
    pub fn get_virtual_indexes(&self) -> Vec<usize> {
        let (visible, overscan, count, extractor) = {
            let o = self.inner.options.borrow();
            (
                self.inner.state.borrow().visible_range(&o),
                o.overscan,
                o.count,
                o.range_extractor.clone(),
            )
        };
        if visible.is_empty() {
            return Vec::new();
        }
        let range = Range {
            start_index: visible.start_index,
            end_index: visible.end_index,
            overscan,
            count,
        };
        let mut indexes = match extractor {
            Some(extract) => extract(range),
            None => default_range_extractor(range),
        };
        debug_assert!(
            indexes.windows(2).all(|w| w[0] <= w[1]),
            "range_extractor must emit sorted indexes"
        );
        indexes.retain(|&i| i < count);
        indexes.dedup();
        indexes
    }

    pub fn get_virtual_items(&self) -> Vec<VirtualItem<E>> {
        let indexes = self.get_virtual_indexes();
        let o = self.inner.options.borrow();
        let st = self.inner.state.borrow();
        indexes
            .into_iter()
            .filter(|&i| i < st.sizes.len())
            .map(|index| VirtualItem {
                index,
                start: st.item_start(&o, index),
                size: st.sizes[index],
                reporter: Rc::clone(&self.inner.reporter),
            })
            .collect()
    }

    pub fn item_start(&self, index: usize) -> Option<u64> {
        let o = self.inner.options.borrow();
        let st = self.inner.state.borrow();
        (o.enabled && index < st.sizes.len()).then(|| st.item_start(&o, index))
    }

    pub fn item_size(&self, index: usize) -> Option<u32> {
        self.inner.state.borrow().sizes.get(index).copied()
    }

    pub fn is_measured(&self, index: usize) -> bool {
        let st = self.inner.state.borrow();
        st.measured.get(index).copied().unwrap_or(false)
    }

    /// Number of cached measured sizes.
    pub fn measurement_cache_len(&self) -> usize {
        self.inner.state.borrow().cache.len()
    }

    pub fn max_scroll_offset(&self) -> u64 {
        let o = self.inner.options.borrow();
        self.inner.state.borrow().max_scroll_offset(&o)
    }

    pub fn clamp_scroll_offset(&self, offset: u64) -> u64 {
        offset.min(self.max_scroll_offset())
    }

    /// The clamped offset that brings `index` into view with the given alignment.
    pub fn scroll_to_index_offset(&self, index: usize, align: Align) -> u64 {
        let o = self.inner.options.borrow();
        let st = self.inner.state.borrow();
        let count = o.count.min(st.sizes.len());
        if !o.enabled || count == 0 {
            return st.scroll_offset;
        }
        let index = index.min(count - 1);
        let start = st.item_start(&o, index);
        let end = start.saturating_add(st.sizes[index] as u64);
        let view = st.viewport.main as u64;
        let sp_start = o.scroll_padding_start as u64;
        let sp_end = o.scroll_padding_end as u64;

        let target = match align {
            Align::Start => start.saturating_sub(sp_start),
            Align::End => end.saturating_add(sp_end).saturating_sub(view),
            Align::Center => (start + (end - start) / 2).saturating_sub(view / 2),
            Align::Auto => {
                let cur = st.scroll_offset;
                if start >= cur && end <= cur.saturating_add(view) {
                    cur
                } else if start < cur {
                    start.saturating_sub(sp_start)
                } else {
                    end.saturating_add(sp_end).saturating_sub(view)
                }
            }
        };
        target.min(st.max_scroll_offset(&o))
    }

    /// Scrolls so that `index` is aligned inside the viewport. Returns the applied offset.
    pub fn scroll_to_index(&self, index: usize, align: Align) -> u64 {
        let offset = self.scroll_to_index_offset(index, align);
        vtrace!(index, offset, "scroll_to_index");
        self.scroll_to(offset);
        offset
    }

    /// Scrolls so that `offset` ends up at the given viewport alignment. Returns the applied
    /// offset.
    pub fn scroll_to_offset(&self, offset: u64, align: Align) -> u64 {
        let view = self.scroll_rect().main as u64;
        let target = match align {
            Align::Start | Align::Auto => offset,
            Align::Center => offset.saturating_sub(view / 2),
            Align::End => offset.saturating_sub(view),
        };
        let target = self.clamp_scroll_offset(target);
        self.scroll_to(target);
        target
    }

    pub fn scroll_by(&self, delta: i64) -> u64 {
        let cur = self.scroll_offset();
        let target = if delta >= 0 {
            cur.saturating_add(delta as u64)
        } else {
            cur.saturating_sub(delta.unsigned_abs())
        };
        let target = self.clamp_scroll_offset(target);
        self.scroll_to(target);
        target
    }

    fn scroll_to(&self, offset: u64) {
        self.batch_update(|v| {
            let moved = v.inner.state.borrow_mut().set_scroll_offset(offset);
            v.push_scroll_offset(offset);
            if moved {
                v.notify();
            }
        });
    }

    fn push_scroll_offset(&self, offset: u64) {
        let element = self.scroll_element();
        let (scroll_to, horizontal) = {
            let o = self.inner.options.borrow();
            (o.scroll_to_fn.clone(), o.horizontal)
        };
        if let (Some(element), Some(scroll_to)) = (element, scroll_to) {
            scroll_to(&element, offset, horizontal);
        }
    }

    /// Measures a rendered element for `index` and records its size.
    ///
    /// Elements that have left the document and indexes beyond `count` are ignored.
    pub fn measure_element_at(&self, index: usize, element: &E) {
        let (count, horizontal, measure) = {
            let o = self.inner.options.borrow();
            (o.count, o.horizontal, Rc::clone(&o.measure_element))
        };
        if index >= count {
            vtrace!(index, count, "measure_element: index out of range");
            return;
        }
        let Some(size) = measure(element, horizontal) else {
            vtrace!(index, "measure_element: element not connected");
            return;
        };
        self.resize_item(index, size);
    }

    /// Records a measured size for `index`.
    ///
    /// When the size differs from the previous one, the change is announced; if the item
    /// starts before the current scroll offset, the offset is shifted by the same delta so the
    /// visible content does not jump. Returns the applied scroll adjustment.
    pub fn resize_item(&self, index: usize, size: u32) -> i64 {
        let (adjusted, delta) = {
            let o = self.inner.options.borrow();
            let mut st = self.inner.state.borrow_mut();
            if index >= o.count || index >= st.sizes.len() {
                return 0;
            }
            st.measured[index] = true;
            st.cache.insert(index, size);

            let cur = st.sizes[index];
            if cur == size {
                return 0;
            }
            let delta = size as i64 - cur as i64;
            st.sizes[index] = size;
            st.sums.add(index, delta);
            vtrace!(index, size, delta, "resize_item");

            let adjusted = st.item_start(&o, index) < st.scroll_offset;
            if adjusted {
                st.scroll_offset = if delta > 0 {
                    st.scroll_offset.saturating_add(delta as u64)
                } else {
                    st.scroll_offset.saturating_sub(delta.unsigned_abs())
                };
            }
            (adjusted, delta)
        };

        self.batch_update(|v| {
            if adjusted {
                v.push_scroll_offset(v.scroll_offset());
            }
            v.notify();
        });
        if adjusted { delta } else { 0 }
    }

    /// Forgets every measured size and falls back to estimates.
    pub fn measure(&self) {
        self.inner.state.borrow_mut().cache.clear();
        self.rebuild_estimates();
        self.notify();
    }

    fn rebuild_estimates(&self) {
        let (count, estimate_size) = {
            let o = self.inner.options.borrow();
            (o.count, Rc::clone(&o.estimate_size))
        };
        let cache = mem::take(&mut self.inner.state.borrow_mut().cache);
        vdebug!(count, cached = cache.len(), "rebuild_estimates");

        let mut sizes = Vec::with_capacity(count);
        let mut measured = Vec::with_capacity(count);
        for i in 0..count {
            match cache.get(&i) {
                Some(&size) => {
                    sizes.push(size);
                    measured.push(true);
                }
                None => {
                    sizes.push(estimate_size(i));
                    measured.push(false);
                }
            }
        }

        {
            let mut st = self.inner.state.borrow_mut();
            st.cache = cache;
            st.sizes = sizes;
            st.measured = measured;
        }
        self.rebuild_fenwick();
    }

    fn rebuild_fenwick(&self) {
        let gap = self.inner.options.borrow().gap;
        let mut st = self.inner.state.borrow_mut();
        st.sums = Fenwick::from_sizes(&st.sizes, gap);
    }
}

impl<S, E> VirtualWindow<E> for Virtualizer<S, E>
where
    S: Clone + PartialEq + 'static,
    E: 'static,
{
    fn get_total_size(&self) -> u64 {
        Virtualizer::get_total_size(self)
    }

    fn get_virtual_items(&self) -> Vec<VirtualItem<E>> {
        Virtualizer::get_virtual_items(self)
    }
}

impl<S, E> Clone for Virtualizer<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S, E> fmt::Debug for Virtualizer<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.inner.state.borrow();
        f.debug_struct("Virtualizer")
            .field("options", &*self.inner.options.borrow())
            .field("viewport", &st.viewport)
            .field("scroll_offset", &st.scroll_offset)
            .field("is_scrolling", &st.is_scrolling)
            .field("mounted", &self.inner.mounted.get())
            .finish_non_exhaustive()
    }
}

impl<S, E> WeakVirtualizer<S, E> {
    pub fn upgrade(&self) -> Option<Virtualizer<S, E>> {
        self.inner.upgrade().map(|inner| Virtualizer { inner })
    }
}

impl<S, E> Clone for WeakVirtualizer<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S, E> fmt::Debug for WeakVirtualizer<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakVirtualizer(..)")
    }
}
