//! The clean-runs fixture against the shared tracking session

use serial_test::serial;

use crate::fixtures;
use crate::tracking;

#[test]
#[serial]
fn test_clean_tracking_runs_flushes_before_and_after() {
    let session = tracking::global();
    session.clear_backend();

    // A run leaked by some earlier test.
    session.start_run("leftover");
    assert_eq!(session.active_count(), 1);

    {
        let _guard = fixtures::clean_tracking_runs();
        assert_eq!(session.active_count(), 0);

        session.start_run("owned-by-this-test");
        assert_eq!(session.active_count(), 1);
    }

    assert_eq!(session.active_count(), 0);
}

#[test]
#[serial]
fn test_clean_tracking_runs_is_a_no_op_when_idle() {
    let session = tracking::global();
    session.clear_backend();

    let _guard = fixtures::clean_tracking_runs();
    assert_eq!(session.active_count(), 0);
}
