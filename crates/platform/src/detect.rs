//! Compile-time and runtime feature detection.
//!
//! This module provides [`runtime_features()`], the cached answer to "which
//! tags can this process execute?". It handles:
//!
//! - Compile-time detection (via `cfg!(target_feature = "...")`)
//! - Runtime detection (CPUID + XGETBV on x86, `AT_HWCAP` on ARM)
//! - Caching (via `OnceLock` with `std`, atomics without)
//! - User-supplied overrides for bare metal and testing
//! - Restriction through the [`FEATURES_ENV`] environment variable
//! - Miri fallback (compile-time features only)
//!
//! Without `std`, or on architectures without a probe (WebAssembly, unknown
//! targets), the runtime answer is the compile-time answer.
//!
//! # Overrides
//!
//! ```
//! use platform::{Features, detect};
//!
//! // Must happen before the first runtime_features() call.
//! if detect::try_set_override(Some(Features::NONE)).is_ok() {
//!   assert_eq!(detect::runtime_features(), Features::NONE);
//! }
//! ```

mod cache_override;
mod compile_time;
mod config;

pub mod arm;
pub mod x86;

pub use cache_override::{clear_override, has_override, set_override, try_set_override};
pub use compile_time::{DEFAULT, DEFAULT_BASE, DEFAULT_EXTRA, compiled_features};
pub use config::FEATURES_ENV;

use crate::{Features, tag::ArchTable};

// ─────────────────────────────────────────────────────────────────────────────
// Main API
// ─────────────────────────────────────────────────────────────────────────────

/// Get the features of the running CPU.
///
/// # Caching
///
/// Detection runs once. With `std` the result lives in a `OnceLock`; without
/// `std` in an atomic state machine (or is recomputed on targets without
/// atomics).
///
/// # Override
///
/// If an override has been set via [`set_override`] before the first call,
/// that value is returned instead of detected features.
///
/// # Miri
///
/// Under Miri, returns [`compiled_features()`] to avoid interpreting CPUID.
#[inline]
#[must_use]
pub fn runtime_features() -> Features {
  cache_override::get_or_init(detect_with_override)
}

/// Detect features without caching, overrides or environment restriction.
///
/// The result is the compile-time set joined with whatever the probe reports,
/// normalized to the declared hierarchy.
#[must_use]
pub fn detect_uncached() -> Features {
  (compiled_features() | probe()).normalized_in(ArchTable::native())
}

#[cold]
fn detect_with_override() -> Features {
  if let Some(features) = cache_override::seal_override() {
    log::debug!("using CPU feature override: {features}");
    return features;
  }

  let detected = detect_uncached();
  #[cfg(feature = "std")]
  let detected = config::restrict_from_env(detected);

  log::debug!("detected CPU features: {detected}");
  detected
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-architecture probes
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(all(feature = "std", not(miri), any(target_arch = "x86_64", target_arch = "x86")))]
fn probe() -> Features {
  x86::decode(x86::probe())
}

#[cfg(all(
  feature = "std",
  not(miri),
  any(
    target_arch = "aarch64",
    all(target_arch = "arm", any(target_os = "linux", target_os = "android"))
  )
))]
fn probe() -> Features {
  arm::probe()
}

#[cfg(not(all(
  feature = "std",
  not(miri),
  any(
    target_arch = "x86_64",
    target_arch = "x86",
    target_arch = "aarch64",
    all(target_arch = "arm", any(target_os = "linux", target_os = "android"))
  )
)))]
const fn probe() -> Features {
  Features::NONE
}
