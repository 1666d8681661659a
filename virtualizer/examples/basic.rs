use std::cell::Cell;

use virtualizer::{Align, Rect, Size, Virtualizer, VirtualizerOptions};

fn main() {
    // No UI: element type is a plain size, measured along the scroll axis.
    let v = Virtualizer::<(), Size>::new(
        VirtualizerOptions::new_with_measure(1_000_000, |_| 1, |s: &Size, horizontal| {
            Some(s.main(horizontal))
        })
        .with_initial_rect(Some(Rect {
            main: 10,
            cross: 80,
        }))
        .with_on_change(Some(|v: &Virtualizer<(), Size>, is_scrolling: bool| {
            println!(
                "on_change: offset={} scrolling={is_scrolling}",
                v.scroll_offset()
            );
        })),
    );
    v.apply_scroll_offset(123_456, true);

    let items = v.get_virtual_items();
    println!("total_size={}", v.get_total_size());
    println!("virtual_range={:?}", v.virtual_range());
    println!("first_visible={:?}", items.first());

    // A rendered row turned out taller than estimated.
    if let Some(item) = items.first() {
        item.measure_element(&Size::new(80, 3));
    }
    println!("after measuring: total_size={}", v.get_total_size());

    // One notification for both moves.
    let target = Cell::new(0);
    v.batch_update(|v| {
        target.set(v.scroll_to_index(999_999, Align::End));
        v.scroll_by(-5);
    });
    println!(
        "after scroll_to_index: target={} offset={}",
        target.get(),
        v.scroll_offset()
    );
}
