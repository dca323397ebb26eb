use super::*;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn pixel_viewport_validity() {
    assert!(!PixelViewport::INVALID.is_valid());
    assert!(PixelViewport::new(0, 0, 0, 0).is_valid());
    assert!(!PixelViewport::new(0, 0, 0, 10).has_area());
    let pvp = PixelViewport::new(100, 50, 640, 480).at_origin();
    assert_eq!(pvp, PixelViewport::new(0, 0, 640, 480));
}

#[test]
fn viewport_intersection_clips_to_overlap() {
    let mut vp = Viewport::new(0.0, 0.0, 0.5, 1.0);
    vp.intersect(Viewport::new(0.25, 0.0, 0.5, 1.0));
    assert!(approx(vp.x, 0.25));
    assert!(approx(vp.w, 0.25));
    assert!(vp.has_area());

    let mut disjoint = Viewport::new(0.0, 0.0, 0.25, 1.0);
    disjoint.intersect(Viewport::new(0.5, 0.0, 0.5, 1.0));
    assert!(!disjoint.has_area());
}

#[test]
fn viewport_transform_then_apply_round_trips_into_parent_space() {
    let segment = Viewport::new(0.5, 0.0, 0.5, 1.0);
    let mut contribution = Viewport::new(0.5, 0.0, 0.25, 1.0);
    contribution.transform(segment);
    assert!(approx(contribution.x, 0.0));
    assert!(approx(contribution.w, 0.5));

    let mut output = Viewport::FULL;
    output.apply(contribution);
    assert!(approx(output.w, 0.5));
}

#[test]
fn fixed_point_range_uses_basis() {
    let r = Range::from_fixed(33_333, RANGE_BASIS);
    assert!(approx(r.start, 0.33333));
    assert_eq!(r.end, 1.0);
    assert!(approx(Range::ALL.width(), 1.0));
}

#[test]
fn eye_masks_compose() {
    let left = Eyes::LEFT | Eyes::CYCLOP;
    assert!(left.contains(Eyes::CYCLOP));
    assert!(!left.contains(Eyes::RIGHT));
    assert_eq!(Eyes::STEREO, Eyes::LEFT | Eyes::RIGHT);
}
