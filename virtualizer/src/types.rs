use alloc::rc::Rc;
use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Align {
    Start,
    Center,
    End,
    Auto,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollDirection {
    Forward,
    Backward,
}

/// Physical size of an element, as reported by the UI layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The size along the scroll axis.
    pub fn main(&self, horizontal: bool) -> u32 {
        if horizontal { self.width } else { self.height }
    }
}

/// Axis-relative viewport geometry.
///
/// `main` is the virtualized axis (height for vertical lists, width for horizontal ones).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub main: u32,
    pub cross: u32,
}

impl Rect {
    pub fn from_size(size: Size, horizontal: bool) -> Self {
        if horizontal {
            Self {
                main: size.width,
                cross: size.height,
            }
        } else {
            Self {
                main: size.height,
                cross: size.width,
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualRange {
    pub start_index: usize,
    pub end_index: usize, // exclusive
}

impl VirtualRange {
    pub const EMPTY: Self = Self {
        start_index: 0,
        end_index: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.start_index >= self.end_index
    }
}

/// Input handed to a range extractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range {
    pub start_index: usize,
    pub end_index: usize, // exclusive, visible range (no overscan)
    pub overscan: usize,
    pub count: usize,
}

/// The visible range widened by `overscan` and clamped to `count`.
pub fn default_range_extractor(range: Range) -> alloc::vec::Vec<usize> {
    let start = range.start_index.saturating_sub(range.overscan);
    let end = range
        .end_index
        .saturating_add(range.overscan)
        .min(range.count);
    (start..end).collect()
}

/// Something a virtual item can report its measured element to.
///
/// Implemented by the engine; descriptors hold it type-erased so they do not carry the
/// scroll element type.
pub(crate) trait ReportSize<E> {
    fn report(&self, index: usize, element: &E);
}

/// A descriptor for one item of the current window.
///
/// Descriptors are recreated whenever the window is recomputed. Two descriptors compare
/// equal when they describe the same index at the same position and size; the bound
/// measurement handle does not take part in equality.
pub struct VirtualItem<E> {
    pub index: usize,
    /// Start offset in the scroll axis (includes `scroll_margin` and `padding_start`).
    pub start: u64,
    /// Size in the scroll axis (excludes `gap`).
    pub size: u32,
    pub(crate) reporter: Rc<dyn ReportSize<E>>,
}

impl<E> VirtualItem<E> {
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size as u64)
    }

    /// Reports the rendered element for this item back to the engine that produced it.
    ///
    /// This is a no-op when the engine is gone, the index is no longer part of the list, or
    /// the element is not attached to the document anymore.
    pub fn measure_element(&self, element: &E) {
        self.reporter.report(self.index, element);
    }
}

impl<E> Clone for VirtualItem<E> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            start: self.start,
            size: self.size,
            reporter: Rc::clone(&self.reporter),
        }
    }
}

impl<E> PartialEq for VirtualItem<E> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.start == other.start && self.size == other.size
    }
}

impl<E> Eq for VirtualItem<E> {}

impl<E> fmt::Debug for VirtualItem<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualItem")
            .field("index", &self.index)
            .field("start", &self.start)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Releases a resource acquired by a lifecycle hook or an observer.
pub type Teardown = alloc::boxed::Box<dyn FnOnce()>;

/// Measurable rendered element.
///
/// This is the default source of measurements used by [`crate::VirtualizerOptions::new`].
pub trait ItemElement {
    /// Whether the element is currently part of the rendered document.
    fn is_connected(&self) -> bool;

    /// The element's rendered size.
    fn size(&self) -> Size;
}

impl<T: ItemElement + ?Sized> ItemElement for Rc<T> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn size(&self) -> Size {
        (**self).size()
    }
}

/// Default measurement: the element's size along the scroll axis, or `None` once it has left
/// the document.
pub fn measure_item_element<E: ItemElement>(element: &E, horizontal: bool) -> Option<u32> {
    if !element.is_connected() {
        return None;
    }
    Some(element.size().main(horizontal))
}
