use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::virtualizer::Virtualizer;
use crate::{ItemElement, Range, Rect, Size, Teardown, measure_item_element};

/// A callback fired after the engine's state changed.
///
/// The second argument is `is_scrolling`.
pub type OnChangeCallback<S, E> = Rc<dyn Fn(&Virtualizer<S, E>, bool)>;

/// Returns the indexes to render for a given visible range (sorted ascending).
pub type RangeExtractor = Rc<dyn Fn(Range) -> Vec<usize>>;

/// Resolves the current scroll container, if one exists yet.
pub type GetScrollElementFn<S> = Rc<dyn Fn() -> Option<S>>;

/// Subscribes to size changes of the scroll container.
///
/// Implementations may invoke the sink synchronously with the current size.
pub type ObserveElementRectFn<S> = Rc<dyn Fn(&S, Box<dyn Fn(Size)>) -> Teardown>;

/// Subscribes to scroll offset changes of the scroll container.
///
/// The `bool` argument is `horizontal`; the sink receives `(offset, is_scrolling)`.
pub type ObserveElementOffsetFn<S> = Rc<dyn Fn(&S, bool, Box<dyn Fn(u64, bool)>) -> Teardown>;

/// Moves the real scroll container to `offset`. The `bool` argument is `horizontal`.
pub type ScrollToFn<S> = Rc<dyn Fn(&S, u64, bool)>;

/// Measures a rendered item along the scroll axis (`bool` is `horizontal`).
///
/// Returns `None` when the element is no longer part of the document.
pub type MeasureElementFn<E> = Rc<dyn Fn(&E, bool) -> Option<u32>>;

/// Initial scroll offset configuration.
#[derive(Clone)]
pub enum InitialOffset {
    Value(u64),
    /// Evaluated whenever the engine resets its scroll position.
    Provider(Rc<dyn Fn() -> u64>),
}

impl InitialOffset {
    pub(crate) fn resolve(&self) -> u64 {
        match self {
            Self::Value(v) => *v,
            Self::Provider(f) => f(),
        }
    }
}

impl Default for InitialOffset {
    fn default() -> Self {
        Self::Value(0)
    }
}

impl core::fmt::Debug for InitialOffset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

/// Configuration for [`crate::Virtualizer`].
///
/// `S` is the scroll container handle, `E` the rendered item element. Closures are stored in
/// `Rc`s so the whole set is cheap to clone and re-apply with `Virtualizer::set_options`.
pub struct VirtualizerOptions<S, E> {
    pub count: usize,
    pub estimate_size: Rc<dyn Fn(usize) -> u32>,
    pub range_extractor: Option<RangeExtractor>,

    /// When disabled, the engine reports an empty window and a zero total size, and does not
    /// observe its scroll container.
    pub enabled: bool,

    pub overscan: usize,

    /// Lays the list out along the x axis instead of the y axis.
    pub horizontal: bool,

    /// Viewport geometry used until the scroll container reports its own.
    pub initial_rect: Option<Rect>,

    /// Padding before the first item.
    pub padding_start: u32,
    /// Padding after the last item.
    pub padding_end: u32,

    /// Additional padding applied when computing scroll-to offsets.
    pub scroll_padding_start: u32,
    /// Additional padding applied when computing scroll-to offsets.
    pub scroll_padding_end: u32,

    /// Where the list starts inside the scroll container.
    pub scroll_margin: u32,

    pub initial_offset: InitialOffset,

    /// Space between items.
    pub gap: u32,

    pub get_scroll_element: Option<GetScrollElementFn<S>>,
    pub observe_element_rect: Option<ObserveElementRectFn<S>>,
    pub observe_element_offset: Option<ObserveElementOffsetFn<S>>,
    pub scroll_to_fn: Option<ScrollToFn<S>>,
    pub measure_element: MeasureElementFn<E>,

    pub on_change: Option<OnChangeCallback<S, E>>,
}

impl<S, E> Clone for VirtualizerOptions<S, E> {
    fn clone(&self) -> Self {
        Self {
            count: self.count,
            estimate_size: Rc::clone(&self.estimate_size),
            range_extractor: self.range_extractor.clone(),
            enabled: self.enabled,
            overscan: self.overscan,
            horizontal: self.horizontal,
            initial_rect: self.initial_rect,
            padding_start: self.padding_start,
            padding_end: self.padding_end,
            scroll_padding_start: self.scroll_padding_start,
            scroll_padding_end: self.scroll_padding_end,
            scroll_margin: self.scroll_margin,
            initial_offset: self.initial_offset.clone(),
            gap: self.gap,
            get_scroll_element: self.get_scroll_element.clone(),
            observe_element_rect: self.observe_element_rect.clone(),
            observe_element_offset: self.observe_element_offset.clone(),
            scroll_to_fn: self.scroll_to_fn.clone(),
            measure_element: Rc::clone(&self.measure_element),
            on_change: self.on_change.clone(),
        }
    }
}

impl<S, E: ItemElement + 'static> VirtualizerOptions<S, E> {
    /// Creates options that measure items through their [`ItemElement`] implementation.
    ///
    /// `estimate_size(i)` is used for every item until it has been measured.
    pub fn new(count: usize, estimate_size: impl Fn(usize) -> u32 + 'static) -> Self {
        Self::new_with_measure(count, estimate_size, measure_item_element::<E>)
    }
}

impl<S, E> VirtualizerOptions<S, E> {
    /// Creates options with a custom element measurement.
    pub fn new_with_measure(
        count: usize,
        estimate_size: impl Fn(usize) -> u32 + 'static,
        measure_element: impl Fn(&E, bool) -> Option<u32> + 'static,
    ) -> Self {
        Self {
            count,
            estimate_size: Rc::new(estimate_size),
            range_extractor: None,
            enabled: true,
            overscan: 1,
            horizontal: false,
            initial_rect: None,
            padding_start: 0,
            padding_end: 0,
            scroll_padding_start: 0,
            scroll_padding_end: 0,
            scroll_margin: 0,
            initial_offset: InitialOffset::default(),
            gap: 0,
            get_scroll_element: None,
            observe_element_rect: None,
            observe_element_offset: None,
            scroll_to_fn: None,
            measure_element: Rc::new(measure_element),
            on_change: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_estimate_size(mut self, estimate_size: impl Fn(usize) -> u32 + 'static) -> Self {
        self.estimate_size = Rc::new(estimate_size);
        self
    }

    pub fn with_range_extractor(
        mut self,
        range_extractor: Option<impl Fn(Range) -> Vec<usize> + 'static>,
    ) -> Self {
        self.range_extractor = range_extractor.map(|f| Rc::new(f) as _);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    pub fn with_horizontal(mut self, horizontal: bool) -> Self {
        self.horizontal = horizontal;
        self
    }

    pub fn with_initial_rect(mut self, initial_rect: Option<Rect>) -> Self {
        self.initial_rect = initial_rect;
        self
    }

    pub fn with_padding(mut self, padding_start: u32, padding_end: u32) -> Self {
        self.padding_start = padding_start;
        self.padding_end = padding_end;
        self
    }

    pub fn with_scroll_padding(
        mut self,
        scroll_padding_start: u32,
        scroll_padding_end: u32,
    ) -> Self {
        self.scroll_padding_start = scroll_padding_start;
        self.scroll_padding_end = scroll_padding_end;
        self
    }

    pub fn with_scroll_margin(mut self, scroll_margin: u32) -> Self {
        self.scroll_margin = scroll_margin;
        self
    }

    pub fn with_initial_offset(mut self, initial_offset: InitialOffset) -> Self {
        self.initial_offset = initial_offset;
        self
    }

    pub fn with_initial_offset_value(mut self, initial_offset: u64) -> Self {
        self.initial_offset = InitialOffset::Value(initial_offset);
        self
    }

    pub fn with_gap(mut self, gap: u32) -> Self {
        self.gap = gap;
        self
    }

    pub fn with_get_scroll_element(
        mut self,
        get_scroll_element: impl Fn() -> Option<S> + 'static,
    ) -> Self {
        self.get_scroll_element = Some(Rc::new(get_scroll_element));
        self
    }

    pub fn with_observe_element_rect(
        mut self,
        observe: impl Fn(&S, Box<dyn Fn(Size)>) -> Teardown + 'static,
    ) -> Self {
        self.observe_element_rect = Some(Rc::new(observe));
        self
    }

    pub fn with_observe_element_offset(
        mut self,
        observe: impl Fn(&S, bool, Box<dyn Fn(u64, bool)>) -> Teardown + 'static,
    ) -> Self {
        self.observe_element_offset = Some(Rc::new(observe));
        self
    }

    pub fn with_scroll_to_fn(mut self, scroll_to: impl Fn(&S, u64, bool) + 'static) -> Self {
        self.scroll_to_fn = Some(Rc::new(scroll_to));
        self
    }

    pub fn with_measure_element(
        mut self,
        measure_element: impl Fn(&E, bool) -> Option<u32> + 'static,
    ) -> Self {
        self.measure_element = Rc::new(measure_element);
        self
    }

    pub fn with_on_change(
        mut self,
        on_change: Option<impl Fn(&Virtualizer<S, E>, bool) + 'static>,
    ) -> Self {
        self.on_change = on_change.map(|f| Rc::new(f) as _);
        self
    }
}

impl<S, E> core::fmt::Debug for VirtualizerOptions<S, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VirtualizerOptions")
            .field("count", &self.count)
            .field("enabled", &self.enabled)
            .field("overscan", &self.overscan)
            .field("horizontal", &self.horizontal)
            .field("initial_rect", &self.initial_rect)
            .field("padding_start", &self.padding_start)
            .field("padding_end", &self.padding_end)
            .field("scroll_padding_start", &self.scroll_padding_start)
            .field("scroll_padding_end", &self.scroll_padding_end)
            .field("scroll_margin", &self.scroll_margin)
            .field("initial_offset", &self.initial_offset)
            .field("gap", &self.gap)
            .finish_non_exhaustive()
    }
}
