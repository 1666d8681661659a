//! Reactive bindings for the `virtualizer` windowing engine.
//!
//! The engine is imperative: it mutates its own state when the scroll container moves or an
//! element reports its size, and announces that through `on_change`. This crate turns those
//! announcements into reactive state:
//! - [`create_virtualizer`] builds an engine from a reactive options accessor, attaches it
//!   when its scope mounts and detaches it when the scope is disposed
//! - the returned [`ReactiveVirtualizer`] mirrors the total size and the visible items into
//!   signals, refreshed at most once per display frame
//! - [`create_item_ref`] feeds rendered element sizes back into the engine
//!
//! A small fine-grained runtime ([`Runtime`], [`Scope`], [`Signal`], memos and effects)
//! carries the reactive side. Frames come from a [`FrameScheduler`]; [`FrameClock`] is a
//! manually ticked one.
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod adapter;
mod facade;
mod frame;
mod item_ref;
mod refresh;
mod runtime;
mod scope;
mod signal;


pub use adapter::{
    ElementOptions, ScrollContainer, create_virtualizer, create_virtualizer_base,
    create_window_virtualizer,
};
pub use facade::ReactiveVirtualizer;
pub use frame::{FrameClock, FrameId, FrameScheduler};
pub use item_ref::{ItemRefTargets, create_item_ref};
pub use refresh::AdapterState;
pub use runtime::{Runtime, on};
pub use scope::Scope;
pub use signal::{ReadSignal, Signal};
