use souk_telemetry::{metrics, record_login, record_middleware_forbidden};

#[test]
fn counters_accumulate() {
    let before = metrics().snapshot();
    record_login(true);
    record_login(false);
    record_login(false);
    record_middleware_forbidden();
    let after = metrics().snapshot();

    assert_eq!(after.login_success - before.login_success, 1);
    assert_eq!(after.login_failure - before.login_failure, 2);
    assert_eq!(after.middleware_forbidden - before.middleware_forbidden, 1);
}
