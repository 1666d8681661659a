use alloc::rc::Rc;
use alloc::vec::Vec;

use virtualizer::VirtualItem;

use crate::scope::Scope;

/// The descriptors one rendered element reports to: usually one, two for a grid cell
/// (`[row, column]`).
pub struct ItemRefTargets<E>(Vec<VirtualItem<E>>);

impl<E> From<VirtualItem<E>> for ItemRefTargets<E> {
    fn from(item: VirtualItem<E>) -> Self {
        Self(alloc::vec![item])
    }
}

impl<E> From<&VirtualItem<E>> for ItemRefTargets<E> {
    fn from(item: &VirtualItem<E>) -> Self {
        Self(alloc::vec![item.clone()])
    }
}

impl<E> From<Vec<VirtualItem<E>>> for ItemRefTargets<E> {
    fn from(items: Vec<VirtualItem<E>>) -> Self {
        Self(items)
    }
}

impl<E> From<&[VirtualItem<E>]> for ItemRefTargets<E> {
    fn from(items: &[VirtualItem<E>]) -> Self {
        Self(items.to_vec())
    }
}

impl<E, const N: usize> From<[VirtualItem<E>; N]> for ItemRefTargets<E> {
    fn from(items: [VirtualItem<E>; N]) -> Self {
        Self(items.into())
    }
}

/// Builds the callback a rendered element hands itself to.
///
/// Measurement is deferred until `cx` has committed, so the element is in the document by
/// then. Each descriptor then measures it along its own engine's axis; a changed size flows
/// back through that engine's coalesced refresh. Elements that left the document, a
/// disposed `cx` and descriptors whose engine is gone are ignored.
pub fn create_item_ref<E: 'static>(
    cx: &Scope,
    items: impl Into<ItemRefTargets<E>>,
) -> impl Fn(E) + 'static {
    let ItemRefTargets(items) = items.into();
    let items = Rc::new(items);
    let cx = cx.clone();
    move |element: E| {
        if items.is_empty() {
            return;
        }
        let items = Rc::clone(&items);
        cx.on_mount(move || {
            for item in items.iter() {
                item.measure_element(&element);
            }
        });
    }
}
