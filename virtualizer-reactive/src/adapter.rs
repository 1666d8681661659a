use alloc::boxed::Box;
use alloc::rc::Rc;

use virtualizer::{
    GetScrollElementFn, ObserveElementOffsetFn, ObserveElementRectFn, ScrollToFn, Size, Teardown,
    Virtualizer, VirtualizerOptions,
};

use crate::facade::ReactiveVirtualizer;
use crate::refresh::{Mirror, RefreshScheduler};
use crate::runtime::on;
use crate::scope::Scope;

/// A scroll container the adapter can observe and drive without extra glue.
pub trait ScrollContainer: Clone + PartialEq + 'static {
    /// Reports the container's size now and whenever it changes.
    fn observe_size(&self, on_size: Box<dyn Fn(Size)>) -> Teardown;

    /// Reports `(offset, is_scrolling)` along the scroll axis whenever it changes.
    fn observe_offset(&self, horizontal: bool, on_offset: Box<dyn Fn(u64, bool)>) -> Teardown;

    fn scroll_to(&self, offset: u64, horizontal: bool);
}

/// Observation adapters merged into every configuration the adapter applies.
///
/// They take precedence over the corresponding fields of the caller's options.
pub struct ElementOptions<S> {
    pub observe_element_rect: ObserveElementRectFn<S>,
    pub observe_element_offset: ObserveElementOffsetFn<S>,
    pub scroll_to_fn: ScrollToFn<S>,
}

impl<S: ScrollContainer> ElementOptions<S> {
    /// Adapters that forward to the [`ScrollContainer`] implementation.
    pub fn for_container() -> Self {
        Self {
            observe_element_rect: Rc::new(|s: &S, on_size| s.observe_size(on_size)),
            observe_element_offset: Rc::new(|s: &S, horizontal, on_offset| {
                s.observe_offset(horizontal, on_offset)
            }),
            scroll_to_fn: Rc::new(|s: &S, offset, horizontal| s.scroll_to(offset, horizontal)),
        }
    }
}

impl<S> Clone for ElementOptions<S> {
    fn clone(&self) -> Self {
        Self {
            observe_element_rect: Rc::clone(&self.observe_element_rect),
            observe_element_offset: Rc::clone(&self.observe_element_offset),
            scroll_to_fn: Rc::clone(&self.scroll_to_fn),
        }
    }
}

impl<S> core::fmt::Debug for ElementOptions<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ElementOptions(..)")
    }
}

/// Creates a virtualizer scrolling inside the container returned by the options'
/// `get_scroll_element`.
pub fn create_virtualizer<S, E>(
    cx: &Scope,
    options: impl Fn() -> VirtualizerOptions<S, E> + 'static,
) -> ReactiveVirtualizer<S, E>
where
    S: ScrollContainer,
    E: 'static,
{
    create_virtualizer_base(cx, None, options, ElementOptions::for_container())
}

/// Creates a virtualizer that scrolls with `window` (a page-level container).
///
/// An explicit `get_scroll_element` in the options still wins.
pub fn create_window_virtualizer<S, E>(
    cx: &Scope,
    window: S,
    options: impl Fn() -> VirtualizerOptions<S, E> + 'static,
) -> ReactiveVirtualizer<S, E>
where
    S: ScrollContainer,
    E: 'static,
{
    let get_scroll_element: GetScrollElementFn<S> = Rc::new(move || Some(window.clone()));
    create_virtualizer_base(
        cx,
        Some(get_scroll_element),
        options,
        ElementOptions::for_container(),
    )
}

/// Binds a new engine to `cx`.
///
/// - `options` is re-evaluated reactively; every re-evaluation is applied to the engine as a
///   whole with `set_options`, after the update that caused it has rendered. The first
///   evaluation configures the engine synchronously.
/// - `get_scroll_element` is the fallback used when the options do not provide one.
/// - The engine is attached (`did_mount`) once `cx` mounts and detached when `cx` is
///   disposed. Engine notifications refresh the returned facade's mirrored state once per
///   frame.
pub fn create_virtualizer_base<S, E>(
    cx: &Scope,
    get_scroll_element: Option<GetScrollElementFn<S>>,
    options: impl Fn() -> VirtualizerOptions<S, E> + 'static,
    element_options: ElementOptions<S>,
) -> ReactiveVirtualizer<S, E>
where
    S: Clone + PartialEq + 'static,
    E: 'static,
{
    let rt = cx.runtime().clone();
    let refresh = RefreshScheduler::<S, E>::new(&rt);

    let resolved = cx.create_memo_with(
        {
            let refresh = Rc::clone(&refresh);
            move || {
                let mut merged = options();
                if merged.get_scroll_element.is_none() {
                    merged.get_scroll_element = get_scroll_element.clone();
                }
                let ElementOptions {
                    observe_element_rect,
                    observe_element_offset,
                    scroll_to_fn,
                } = element_options.clone();
                merged.observe_element_rect = Some(observe_element_rect);
                merged.observe_element_offset = Some(observe_element_offset);
                merged.scroll_to_fn = Some(scroll_to_fn);

                let user_on_change = merged.on_change.take();
                let refresh = Rc::clone(&refresh);
                merged.on_change = Some(Rc::new(
                    move |instance: &Virtualizer<S, E>, is_scrolling: bool| {
                        refresh.schedule();
                        if let Some(on_change) = &user_on_change {
                            on_change(instance, is_scrolling);
                        }
                    },
                ));
                merged
            }
        },
        |_, _| false,
    );

    let instance = Virtualizer::new(resolved.get_untracked());
    let mirror = Mirror {
        total_size: cx.create_signal(instance.get_total_size()),
        virtual_items: cx.create_signal(instance.get_virtual_items()),
    };
    refresh.bind(&instance, mirror.clone());
    vdebug!(
        total_size = instance.get_total_size(),
        count = instance.count(),
        "reactive virtualizer created"
    );

    cx.on_cleanup({
        let refresh = Rc::clone(&refresh);
        move || refresh.detach()
    });

    cx.on_mount({
        let cx = cx.clone();
        let instance = instance.clone();
        let refresh = Rc::clone(&refresh);
        move || {
            refresh.attach();
            let teardown = instance.did_mount();
            cx.on_cleanup(teardown);
        }
    });

    cx.create_render_effect(on(
        &rt,
        {
            let mirror = mirror.clone();
            let resolved = resolved.clone();
            move || {
                mirror.total_size.track();
                mirror.virtual_items.track();
                resolved.track();
            }
        },
        {
            let instance = instance.clone();
            move |()| instance.will_update()
        },
        false,
    ));

    cx.create_effect(on(
        &rt,
        {
            let resolved = resolved.clone();
            move || resolved.get()
        },
        {
            let instance = instance.clone();
            move |options| {
                vtrace!("applying re-resolved options");
                instance.set_options(options);
            }
        },
        true,
    ));

    ReactiveVirtualizer::new(
        instance,
        mirror.total_size(),
        mirror.virtual_items(),
        refresh,
    )
}
