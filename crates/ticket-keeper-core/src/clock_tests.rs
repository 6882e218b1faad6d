use super::*;

#[test]
fn test_manual_clock_is_frozen_until_advanced() {
    let start = Timestamp::from_rfc3339("2026-03-01T12:00:00Z").unwrap();
    let clock = ManualClock::new(start);

    assert_eq!(clock.now(), start);
    assert_eq!(clock.now(), start);

    clock.advance_minutes(15);
    assert_eq!(clock.now().minutes_since(start), 15);
}

#[test]
fn test_manual_clock_clones_share_time() {
    let start = Timestamp::from_rfc3339("2026-03-01T12:00:00Z").unwrap();
    let clock = ManualClock::new(start);
    let handle = clock.clone();

    handle.set(start.add_minutes(60));
    assert_eq!(clock.now(), start.add_minutes(60));
}

#[test]
fn test_system_clock_moves_forward() {
    let clock = SystemClock;
    let first = clock.now();
    let second = clock.now();
    assert!(second >= first);
}
