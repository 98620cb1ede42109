//! Panics become fatal shutdown requests once the panic hook is installed.

use trellis::lifecycle::{ShutdownHandle, ShutdownReason};

#[tokio::test]
async fn test_panic_requests_fatal_shutdown() {
    let handle = ShutdownHandle::default();
    handle.request_on_panic();
    assert!(!handle.is_requested());

    let worker = std::thread::spawn(|| panic!("cache worker crashed"));
    assert!(worker.join().is_err());

    assert!(handle.is_requested());
    match handle.requested().await {
        ShutdownReason::Fatal(message) => {
            assert!(message.starts_with("cache worker crashed at "));
            assert!(message.contains("panic_shutdown.rs"));
        }
        other => panic!("unexpected reason: {other:?}"),
    }

    let _ = std::panic::take_hook();
}
