use std::cell::{Cell, RefCell};
use std::rc::Rc;

use virtualizer::{Align, ItemElement, Size, Teardown, VirtualizerOptions};
use virtualizer_reactive::{
    FrameClock, Runtime, ScrollContainer, create_item_ref, create_virtualizer,
};

// A fake scroll container: fixed size, remembers the offset sink so we can "scroll" it.
#[derive(Clone, Default)]
struct Viewport(Rc<ViewportState>);

#[derive(Default)]
struct ViewportState {
    size: Cell<Size>,
    on_offset: RefCell<Option<Box<dyn Fn(u64, bool)>>>,
}

impl PartialEq for Viewport {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl ScrollContainer for Viewport {
    fn observe_size(&self, on_size: Box<dyn Fn(Size)>) -> Teardown {
        on_size(self.0.size.get());
        Box::new(|| {})
    }

    fn observe_offset(&self, _horizontal: bool, on_offset: Box<dyn Fn(u64, bool)>) -> Teardown {
        *self.0.on_offset.borrow_mut() = Some(on_offset);
        let state = Rc::clone(&self.0);
        Box::new(move || {
            state.on_offset.borrow_mut().take();
        })
    }

    fn scroll_to(&self, offset: u64, _horizontal: bool) {
        println!("container scrolled to {offset}");
    }
}

struct Row {
    height: u32,
}

impl ItemElement for Row {
    fn is_connected(&self) -> bool {
        true
    }

    fn size(&self) -> Size {
        Size::new(320, self.height)
    }
}

fn main() {
    let clock = FrameClock::new();
    let rt = Runtime::new(clock.clone());

    let viewport = Viewport::default();
    viewport.0.size.set(Size::new(320, 200));

    let (root, v) = rt.create_root(|cx| {
        let v = create_virtualizer(cx, {
            let viewport = viewport.clone();
            move || {
                let viewport = viewport.clone();
                VirtualizerOptions::<Viewport, Rc<Row>>::new(1_000, |_| 40)
                    .with_get_scroll_element(move || Some(viewport.clone()))
            }
        });

        // "Render": every other row turns out taller than estimated.
        cx.create_render_effect({
            let cx = cx.clone();
            let v = v.clone();
            move || {
                let items = v.get_virtual_items();
                println!(
                    "render: total={} rows={:?}",
                    v.get_total_size(),
                    items.iter().map(|i| i.index).collect::<Vec<_>>()
                );
                for item in &items {
                    let height = if item.index % 2 == 0 { 40 } else { 64 };
                    create_item_ref(&cx, item)(Rc::new(Row { height }));
                }
            }
        });
        v
    });

    // Mounting observed the viewport; its size arrives on the next frame.
    for frame in 0..3 {
        let ran = clock.tick();
        println!("frame {frame}: flushes={ran} state={:?}", v.state());
    }

    if let Some(on_offset) = &*viewport.0.on_offset.borrow() {
        on_offset(2_000, true);
    }
    clock.tick();

    let offset = v.scroll_to_index(500, Align::Center);
    println!("scroll_to_index(500) -> {offset}");
    clock.tick();

    root.dispose();
    println!("after dispose: state={:?} mounted={}", v.state(), v.is_mounted());
}
