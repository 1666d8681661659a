//! An imperative, headless windowing engine.
//!
//! For binding the engine to a fine-grained reactive UI runtime, see the
//! `virtualizer-reactive` crate.
//!
//! The engine computes which items of a large ordered collection fall inside (or near) a
//! scrollable viewport: prefix sums over item sizes, offset → index lookup, overscanned
//! windows, scroll-to offsets and dynamic measurement.
//!
//! It owns no UI objects. A UI layer is expected to provide:
//! - a scroll container handle plus observation adapters (size, offset, scroll-to)
//! - item size estimates and, once rendered, real element measurements
//! - lifecycle calls (`did_mount` / `will_update`)
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod cache;
mod fenwick;
mod options;
mod types;
mod virtualizer;

#[cfg(test)]
mod tests;

pub use options::{
    GetScrollElementFn, InitialOffset, MeasureElementFn, ObserveElementOffsetFn,
    ObserveElementRectFn, OnChangeCallback, RangeExtractor, ScrollToFn, VirtualizerOptions,
};
pub use types::{
    Align, ItemElement, Range, Rect, ScrollDirection, Size, Teardown, VirtualItem, VirtualRange,
    default_range_extractor, measure_item_element,
};
pub use virtualizer::{VirtualWindow, Virtualizer, WeakVirtualizer};
