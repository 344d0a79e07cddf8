//! Platform-agnostic time utilities
//!
//! Provides a unified way to get elapsed time in milliseconds since app start.

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub fn now_millis() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

#[cfg(not(all(target_arch = "wasm32", feature = "wasm")))]
pub fn now_millis() -> f64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_secs_f64() * 1000.0
}
