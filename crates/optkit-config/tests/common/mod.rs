#[allow(dead_code)]
#[path = "../../src/test_support.rs"]
mod test_support;

pub fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, String) {
    test_support::capture_logs_at(tracing::Level::WARN, f)
}
