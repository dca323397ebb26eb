use super::*;

#[test]
fn views_and_segments_register_with_their_owner() {
    let mut d = Display::new();
    let observer = d.add_observer(Observer::new("observer"));
    let layout = d.add_layout(Layout::new("2D"));
    let view = d.add_view(layout, "2D view", Viewport::FULL, Some(observer));
    let canvas = d.add_canvas(Canvas::new("canvas"));
    let segment = d.add_segment(canvas, "segment", Viewport::FULL, None);
    d.add_canvas_layout(canvas, layout);

    assert_eq!(d.layouts[layout].views(), [view]);
    assert_eq!(d.canvases[canvas].segments(), [segment]);
    assert_eq!(d.canvases[canvas].layouts(), [layout]);
    assert_eq!(d.layout_of_view(view).map(|l| l.name.as_str()), Some("2D"));
    assert_eq!(d.segments[segment].eyes, Eyes::ALL);
    assert_eq!(d.canvases[canvas].state(), CanvasState::Stopped);
}

#[test]
fn observers_follow_init_and_exit() {
    let mut d = Display::new();
    let observer = d.add_observer(Observer::new("observer"));
    d.init_observers();
    assert!(d.observers[observer].is_active());
    d.exit_observers();
    assert!(!d.observers[observer].is_active());
}

#[test]
fn purge_keeps_entities_still_in_use() {
    let mut d = Display::new();
    let used = d.add_observer(Observer::new("used"));
    let unused = d.add_observer(Observer::new("unused"));
    let layout = d.add_layout(Layout::new("layout"));
    d.add_view(layout, "view", Viewport::FULL, Some(used));
    let canvas = d.add_canvas(Canvas::new("canvas"));
    d.add_canvas_layout(canvas, layout);

    d.observers[used].needs_delete = true;
    d.observers[unused].needs_delete = true;
    d.layouts[layout].needs_delete = true;
    d.canvases[canvas].state = CanvasState::Running;

    // the running canvas holds the layout, whose view holds `used`
    assert_eq!(d.purge(), 1);
    assert!(d.observers.get(unused).is_none());
    assert!(d.layouts.get(layout).is_some());

    d.canvases[canvas].state = CanvasState::Stopped;
    assert_eq!(d.purge(), 2);
    assert!(d.layouts.get(layout).is_none());
    assert!(d.observers.get(used).is_none());
    assert!(d.canvases[canvas].layouts().is_empty());
    assert!(d.views.is_empty());
}
