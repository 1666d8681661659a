use crate::*;

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn next_u64(&mut self) -> u64 {
        // Deterministic, dependency-free PRNG for tests.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_u32(&mut self, start: u32, end_exclusive: u32) -> u32 {
        start + (self.next_u64() % (end_exclusive - start) as u64) as u32
    }
}

struct FakeElement {
    connected: Cell<bool>,
    size: Cell<Size>,
}

impl FakeElement {
    fn new(width: u32, height: u32) -> Rc<Self> {
        Rc::new(Self {
            connected: Cell::new(true),
            size: Cell::new(Size::new(width, height)),
        })
    }
}

impl ItemElement for FakeElement {
    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn size(&self) -> Size {
        self.size.get()
    }
}

type Element = Rc<FakeElement>;

/// A scroll container that records subscriptions and programmatic scrolls.
#[derive(Default)]
struct FakeScrollerState {
    size: Cell<Size>,
    offset_sink: RefCell<Option<Box<dyn Fn(u64, bool)>>>,
    subscriptions: Cell<usize>,
    unsubscriptions: Cell<usize>,
    scrolled_to: RefCell<Vec<u64>>,
}

#[derive(Clone, Default)]
struct FakeScroller(Rc<FakeScrollerState>);

impl PartialEq for FakeScroller {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl FakeScroller {
    fn with_size(width: u32, height: u32) -> Self {
        let s = Self::default();
        s.0.size.set(Size::new(width, height));
        s
    }

    fn scroll(&self, offset: u64) {
        if let Some(sink) = &*self.0.offset_sink.borrow() {
            sink(offset, true);
        }
    }
}

fn observed_options(
    scroller: Option<FakeScroller>,
    count: usize,
    estimate: u32,
) -> VirtualizerOptions<FakeScroller, Element> {
    let current = RefCell::new(scroller);
    VirtualizerOptions::new(count, move |_| estimate)
        .with_get_scroll_element(move || current.borrow().clone())
        .with_observe_element_rect(|s: &FakeScroller, sink| {
            let state = Rc::clone(&s.0);
            state.subscriptions.set(state.subscriptions.get() + 1);
            sink(state.size.get());
            Box::new(move || state.unsubscriptions.set(state.unsubscriptions.get() + 1))
        })
        .with_observe_element_offset(|s: &FakeScroller, _horizontal, sink| {
            let state = Rc::clone(&s.0);
            state.subscriptions.set(state.subscriptions.get() + 1);
            *state.offset_sink.borrow_mut() = Some(sink);
            Box::new(move || {
                state.offset_sink.borrow_mut().take();
                state.unsubscriptions.set(state.unsubscriptions.get() + 1);
            })
        })
        .with_scroll_to_fn(|s: &FakeScroller, offset, _horizontal| {
            s.0.scrolled_to.borrow_mut().push(offset);
        })
}

fn list(count: usize, estimate: u32, viewport: u32) -> Virtualizer<(), Element> {
    Virtualizer::new(
        VirtualizerOptions::new(count, move |_| estimate).with_initial_rect(Some(Rect {
            main: viewport,
            cross: 100,
        })),
    )
}

fn expected_item_start(sizes: &[u32], gap: u32, padding_start: u32, index: usize) -> u64 {
    let mut off = padding_start as u64;
    for (i, &size) in sizes.iter().enumerate().take(index) {
        off += size as u64;
        if i + 1 < sizes.len() {
            off += gap as u64;
        }
    }
    off
}

#[test]
fn total_size_includes_padding_and_measurements() {
    let v = Virtualizer::<(), Element>::new(
        VirtualizerOptions::new(3, |_| 50)
            .with_padding(10, 20)
            .with_initial_rect(Some(Rect {
                main: 400,
                cross: 100,
            })),
    );
    assert_eq!(v.get_total_size(), 180);

    assert_eq!(v.resize_item(1, 80), 0);
    assert_eq!(v.get_total_size(), 210);
    assert_eq!(v.item_size(0), Some(50));
    assert_eq!(v.item_size(2), Some(50));
    assert_eq!(v.item_start(0), Some(10));
    assert_eq!(v.item_start(2), Some(10 + 50 + 80));
    assert!(v.is_measured(1));
    assert!(!v.is_measured(0));
}

#[test]
fn item_starts_match_naive_prefix_sums() {
    let mut rng = Lcg(7);
    let sizes: Vec<u32> = (0..257).map(|_| rng.gen_range_u32(1, 40)).collect();
    let table = sizes.clone();
    let v = Virtualizer::<(), Element>::new(
        VirtualizerOptions::new(sizes.len(), move |i| table[i])
            .with_gap(3)
            .with_padding(5, 7),
    );

    let mut sizes = sizes;
    for _ in 0..64 {
        let index = rng.gen_range_u32(0, sizes.len() as u32) as usize;
        let size = rng.gen_range_u32(1, 90);
        v.resize_item(index, size);
        sizes[index] = size;

        for probe in [0, index, sizes.len() - 1] {
            assert_eq!(
                v.item_start(probe),
                Some(expected_item_start(&sizes, 3, 5, probe))
            );
        }
    }
    let expected_total = expected_item_start(&sizes, 3, 5, sizes.len() - 1)
        + *sizes.last().unwrap() as u64
        + 7;
    assert_eq!(v.get_total_size(), expected_total);
}

#[test]
fn window_covers_viewport_plus_overscan() {
    let v = Virtualizer::<(), Element>::new(
        VirtualizerOptions::new(100, |_| 10)
            .with_initial_rect(Some(Rect {
                main: 30,
                cross: 100,
            }))
            .with_initial_offset_value(200),
    );
    assert_eq!(
        v.visible_range(),
        VirtualRange {
            start_index: 20,
            end_index: 23
        }
    );
    assert_eq!(
        v.virtual_range(),
        VirtualRange {
            start_index: 19,
            end_index: 24
        }
    );

    let items = v.get_virtual_items();
    let indexes: Vec<usize> = items.iter().map(|it| it.index).collect();
    assert_eq!(indexes, [19, 20, 21, 22, 23]);
    assert_eq!(items[0].start, 190);
    assert_eq!(items[0].end(), 200);
}

#[test]
fn empty_viewport_or_disabled_yields_no_items() {
    let v = Virtualizer::<(), Element>::new(VirtualizerOptions::new(10, |_| 10));
    assert!(v.get_virtual_items().is_empty());

    let v = list(10, 10, 50);
    assert!(!v.get_virtual_items().is_empty());
    v.update_options(|o| o.enabled = false);
    assert!(v.get_virtual_items().is_empty());
    assert_eq!(v.get_total_size(), 0);
}

#[test]
fn range_extractor_can_pin_an_index() {
    let v = Virtualizer::<(), Element>::new(
        VirtualizerOptions::new(1000, |_| 1)
            .with_initial_rect(Some(Rect {
                main: 5,
                cross: 1,
            }))
            .with_initial_offset_value(500)
            .with_overscan(0)
            .with_range_extractor(Some(|r: Range| {
                let mut out = alloc::vec![0];
                out.extend(r.start_index..r.end_index);
                out
            })),
    );
    assert_eq!(v.get_virtual_indexes(), [0, 500, 501, 502, 503, 504]);
}

#[test]
fn on_change_fires_once_per_batch() {
    let calls = Rc::new(Cell::new(0usize));
    let v = Virtualizer::<(), Element>::new(VirtualizerOptions::new(100, |_| 10).with_on_change(
        Some({
            let calls = Rc::clone(&calls);
            move |_: &Virtualizer<(), Element>, _| calls.set(calls.get() + 1)
        }),
    ));

    v.batch_update(|v| {
        v.apply_scroll_rect(Size::new(100, 40));
        v.apply_scroll_offset(30, true);
        v.resize_item(5, 12);
    });
    assert_eq!(calls.get(), 1);

    v.resize_item(5, 12);
    assert_eq!(calls.get(), 1, "an unchanged size is not a change");
}

#[test]
fn measuring_above_the_viewport_shifts_scroll_offset() {
    let v = list(100, 10, 30);
    v.apply_scroll_offset(100, false);

    assert_eq!(v.resize_item(0, 30), 20);
    assert_eq!(v.scroll_offset(), 120);

    // Items inside the viewport do not move it.
    assert_eq!(v.resize_item(13, 30), 0);
    assert_eq!(v.scroll_offset(), 120);
}

#[test]
fn measure_element_uses_the_scroll_axis() {
    let v = list(10, 50, 200);
    let el = FakeElement::new(90, 120);
    let items = v.get_virtual_items();
    items[2].measure_element(&el);
    assert_eq!(v.item_size(2), Some(120));

    let h = Virtualizer::<(), Element>::new(
        VirtualizerOptions::new(10, |_| 50)
            .with_horizontal(true)
            .with_initial_rect(Some(Rect {
                main: 200,
                cross: 100,
            })),
    );
    h.get_virtual_items()[3].measure_element(&el);
    assert_eq!(h.item_size(3), Some(90));
}

#[test]
fn measure_element_ignores_detached_elements_and_stale_indexes() {
    let v = list(10, 50, 200);
    let items = v.get_virtual_items();
    let el = FakeElement::new(10, 99);

    el.connected.set(false);
    items[1].measure_element(&el);
    assert_eq!(v.item_size(1), Some(50));
    assert!(!v.is_measured(1));

    el.connected.set(true);
    v.update_options(|o| o.count = 1);
    items[1].measure_element(&el);
    assert_eq!(v.measurement_cache_len(), 0);
    assert_eq!(v.get_total_size(), 50);
}

#[test]
fn descriptors_do_not_keep_the_engine_alive() {
    let items = {
        let v = list(10, 50, 200);
        v.get_virtual_items()
    };
    items[0].measure_element(&FakeElement::new(1, 1));
}

#[test]
fn set_options_keeps_measurements() {
    let v = list(10, 50, 200);
    v.resize_item(3, 70);
    v.update_options(|o| {
        o.count = 20;
        o.estimate_size = Rc::new(|_: usize| 40u32);
    });
    assert_eq!(v.count(), 20);
    assert_eq!(v.item_size(3), Some(70));
    assert_eq!(v.item_size(4), Some(40));

    v.measure();
    assert_eq!(v.item_size(3), Some(40));
}

#[test]
fn did_mount_observes_and_teardown_unsubscribes() {
    let scroller = FakeScroller::with_size(100, 60);
    let v = Virtualizer::new(observed_options(Some(scroller.clone()), 100, 10));

    v.will_update();
    assert_eq!(scroller.0.subscriptions.get(), 0, "no observation before mount");

    let teardown = v.did_mount();
    assert!(v.is_mounted());
    assert_eq!(scroller.0.subscriptions.get(), 2);
    assert_eq!(v.scroll_rect().main, 60);

    scroller.scroll(40);
    assert_eq!(v.scroll_offset(), 40);
    assert!(v.is_scrolling());
    assert_eq!(v.visible_range().start_index, 4);

    teardown();
    assert!(!v.is_mounted());
    assert_eq!(scroller.0.unsubscriptions.get(), 2);
    assert!(v.scroll_element().is_none());
    scroller.scroll(80);
    assert_eq!(v.scroll_offset(), 40);
}

#[test]
fn will_update_moves_observation_to_a_new_scroll_element() {
    let first = FakeScroller::with_size(100, 60);
    let second = FakeScroller::with_size(100, 90);
    let current = Rc::new(RefCell::new(Some(first.clone())));
    let v = Virtualizer::new(observed_options(None, 100, 10).with_get_scroll_element({
        let current = Rc::clone(&current);
        move || current.borrow().clone()
    }));
    let _teardown = v.did_mount();
    assert_eq!(first.0.subscriptions.get(), 2);

    v.will_update();
    assert_eq!(first.0.subscriptions.get(), 2, "same element is not re-observed");

    *current.borrow_mut() = Some(second.clone());
    v.will_update();
    assert_eq!(first.0.unsubscriptions.get(), 2);
    assert_eq!(second.0.subscriptions.get(), 2);
    assert_eq!(v.scroll_rect().main, 90);
}

#[test]
fn scroll_to_index_aligns_and_drives_the_container() {
    let scroller = FakeScroller::with_size(100, 30);
    let v = Virtualizer::new(observed_options(Some(scroller.clone()), 100, 10));
    let _teardown = v.did_mount();

    assert_eq!(v.scroll_to_index(50, Align::Start), 500);
    assert_eq!(v.scroll_offset(), 500);
    assert_eq!(v.scroll_to_index(50, Align::End), 480);
    assert_eq!(v.scroll_to_index(50, Align::Center), 490);
    assert_eq!(v.scroll_to_index(51, Align::Auto), 490);
    assert_eq!(v.scroll_to_index(99, Align::Start), 970, "clamped to the end");
    assert_eq!(v.scroll_by(-70), 900);
    assert_eq!(v.scroll_to_offset(100, Align::Center), 85);

    assert_eq!(
        *scroller.0.scrolled_to.borrow(),
        [0, 500, 480, 490, 490, 970, 900, 85]
    );
}
