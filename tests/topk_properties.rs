//! Top-K heap invariants (4-5) under longer, more varied push sequences
//! than the narrow cases pinned down alongside `topk.rs`.

use sketchtrain::TopKHeap;

#[test]
fn heap_and_dict_stay_consistent_across_many_pushes() {
    let mut h: TopKHeap<i32> = TopKHeap::new(32);
    let mut x: u32 = 0xDEAD_BEEF;
    for i in 0..2000 {
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        let key = (x % 500) as i32;
        let value = ((x >> 8) % 10_000) as f32 / 100.0 - 50.0;
        h.push(key, value);

        // every `contains`ed key must have a retrievable last-seen value
        if h.contains(&key) {
            assert!(h.value_for(&key).is_some(), "iteration {i}: contained key has no value");
        }
    }
    assert!(h.len() <= 32);
}

#[test]
fn admission_rejects_challengers_inside_the_eps_band() {
    let mut h: TopKHeap<i32> = TopKHeap::new(4);
    for (k, v) in [(1, 100.0), (2, 110.0), (3, 120.0), (4, 130.0)] {
        h.push(k, v);
    }
    assert_eq!(h.minimum(), 100.0);

    // 100 * 1.05 = 105; a challenger at 104.9 must not evict or be admitted.
    h.push(5, 104.9);
    assert!(!h.contains(&5));
    assert!(h.contains(&1));
    assert_eq!(h.minimum(), 100.0);

    // a clear winner above the band does get admitted.
    h.push(6, 200.0);
    assert!(h.contains(&6));
    assert!(!h.contains(&1));
}

#[test]
fn repushing_a_resident_key_outside_the_band_reorders_the_heap() {
    let mut h: TopKHeap<i32> = TopKHeap::new(4);
    for (k, v) in [(1, 10.0), (2, 20.0), (3, 30.0), (4, 40.0)] {
        h.push(k, v);
    }
    assert_eq!(h.minimum(), 10.0);

    // key 4 drops in magnitude well outside its own EPS band and should
    // become the new minimum.
    h.push(4, 1.0);
    assert_eq!(h.minimum(), 1.0);
    assert!(h.contains(&4));
}
