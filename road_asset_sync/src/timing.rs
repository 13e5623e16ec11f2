use std::time::Instant;

use tracing::debug;

/// Runs a synchronous stage and logs how long it took.
pub fn timed<T>(stage: &'static str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    debug!(stage, elapsed_ms = start.elapsed().as_millis() as u64, "stage finished");
    out
}
