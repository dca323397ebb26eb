use super::*;

#[test]
fn arena_handles_stay_stable_across_removal() {
    let mut arena = Arena::<NodeId, &str>::new();
    let a = arena.insert("a");
    let b = arena.insert("b");
    let c = arena.insert("c");

    assert_eq!(arena.remove(b), Some("b"));
    assert_eq!(arena.get(b), None);
    assert_eq!(arena[a], "a");
    assert_eq!(arena[c], "c");
    assert_eq!(arena.len(), 2);
    assert_eq!(arena.ids(), vec![a, c]);

    let d = arena.insert("d");
    assert_ne!(d, b, "removed slots must not be reused");
}

#[test]
fn arena_iter_mut_updates_in_place() {
    let mut arena = Arena::<ChannelId, u32>::new();
    arena.insert(1);
    arena.insert(2);
    for (_, v) in arena.iter_mut() {
        *v *= 10;
    }
    let values: Vec<u32> = arena.iter().map(|(_, v)| *v).collect();
    assert_eq!(values, vec![10, 20]);
}
