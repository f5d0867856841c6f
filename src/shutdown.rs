use std::sync::atomic::{AtomicBool, Ordering};

/// The only state a signal handler touches. `install` arms `SIGINT`/`SIGTERM`
/// handlers that do nothing but flip this flag; the reactor loop polls it
/// once per tick and exits cleanly when it's set.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

pub fn requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

extern "C" fn on_signal(_signum: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Installs `on_signal` for `SIGINT` and `SIGTERM`. Safe to call once at
/// startup, before the reactor loop begins.
pub fn install() {
    unsafe {
        libc::signal(libc::SIGINT, on_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, on_signal as libc::sighandler_t);
    }
}
