//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `cueline_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("cueline_core ping={}", cueline_core::ping());
    println!("cueline_core version={}", cueline_core::core_version());
}
