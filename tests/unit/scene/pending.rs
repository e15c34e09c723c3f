use super::*;

#[test]
fn detached_stamps_are_always_authoritative() {
    let stamp = RenderStamp::detached();
    assert!(stamp.is_authoritative());
}

#[test]
fn a_newer_begin_supersedes_the_older_stamp() {
    let pending = PendingRenders::new();
    let first = pending.begin(RelFrame(10));
    assert!(first.is_authoritative());

    let second = pending.begin(RelFrame(10));
    assert!(!first.is_authoritative());
    assert!(second.is_authoritative());
}

#[test]
fn different_frames_do_not_supersede_each_other() {
    let pending = PendingRenders::new();
    let a = pending.begin(RelFrame(1));
    let b = pending.begin(RelFrame(2));
    assert!(a.is_authoritative());
    assert!(b.is_authoritative());
}

#[test]
fn clear_forgets_the_pending_marker_but_not_authority() {
    let pending = PendingRenders::new();
    let stamp = pending.begin(RelFrame(3));
    assert!(pending.is_pending(RelFrame(3)));

    pending.clear(RelFrame(3));
    assert!(!pending.is_pending(RelFrame(3)));
    // The finished render is still the authoritative one.
    assert!(stamp.is_authoritative());
}

#[test]
fn stamps_share_state_across_clones() {
    let pending = PendingRenders::new();
    let stamp = pending.begin(RelFrame(0));
    let clone = stamp.clone();
    pending.begin(RelFrame(0));
    assert!(!stamp.is_authoritative());
    assert!(!clone.is_authoritative());
}
