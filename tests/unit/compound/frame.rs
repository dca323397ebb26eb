use super::*;
use std::collections::HashSet;

#[test]
fn names_are_prefixed_and_counted_from_one() {
    let counter = FrameNameCounter::new();
    assert_eq!(counter.next_name("2D"), "Frame.2D.1");
    assert_eq!(counter.next_name("DB"), "Frame.DB.2");
    assert_eq!(counter.current(), 2);
}

#[test]
fn clones_share_one_count_across_threads() {
    let counter = FrameNameCounter::new();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let c = counter.clone();
            std::thread::spawn(move || (0..100).map(|_| c.next_name("2D")).collect::<Vec<_>>())
        })
        .collect();

    let mut names = HashSet::new();
    for h in handles {
        for name in h.join().unwrap() {
            assert!(names.insert(name), "duplicate frame name");
        }
    }
    assert_eq!(names.len(), 800);
}
