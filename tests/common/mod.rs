//! Shared test scaffolding. `tests/common/mod.rs` (rather than
//! `tests/common.rs`) keeps Cargo from treating this as its own test binary.

/// Initializes `env_logger` once per test process so `debug!`/`warn!` calls
/// inside the session state machines are visible with `--nocapture`,
/// without panicking if another test in the same binary already did it.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
