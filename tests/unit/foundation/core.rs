use super::*;

#[test]
fn index_range_rejects_inverted_bounds() {
    assert!(IndexRange::new(3, 2).is_err());
    assert!(IndexRange::new(2, 2).is_ok());
}

#[test]
fn single_covers_exactly_one_index() {
    let r = IndexRange::single(7);
    assert_eq!(r.span(), 1);
    assert!(r.contains(7));
    assert!(!r.contains(6));
    assert!(!r.contains(8));
}

#[test]
fn bounds_are_inclusive() {
    let r = IndexRange { min: -2, max: 4 };
    assert!(r.contains(-2));
    assert!(r.contains(4));
    assert_eq!(r.span(), 7);
}

#[test]
fn overlap_and_intersection_agree() {
    let a = IndexRange { min: 0, max: 10 };
    let b = IndexRange { min: 10, max: 20 };
    let c = IndexRange { min: 11, max: 20 };
    assert!(a.overlaps(b));
    assert_eq!(a.intersection(b), Some(IndexRange { min: 10, max: 10 }));
    assert!(!a.overlaps(c));
    assert_eq!(a.intersection(c), None);
}

#[test]
fn second_ranges_tile_the_sample_axis() {
    let rate = 44_100;
    let s0 = second_sample_range(0, rate);
    let s1 = second_sample_range(1, rate);
    assert_eq!(s0, IndexRange { min: 0, max: 44_099 });
    assert_eq!(s1.min, s0.max + 1);
    assert_eq!(s1.span(), u64::from(rate));

    let neg = second_sample_range(-1, rate);
    assert_eq!(neg.max + 1, s0.min);
}
