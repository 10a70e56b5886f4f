//! Compile-time and runtime selection of SIMD implementation variants.
//!
//! `isatag` models instruction-set extensions (x86 SSE/AVX, ARM NEON,
//! WebAssembly SIMD128) as composable tags, detects which of them the running
//! CPU supports, and picks the best of several implementation variants, either
//! during const evaluation or once at runtime.
//!
//! # Quick Start
//!
//! ```
//! use isatag::prelude::*;
//!
//! type Popcount = fn(&[u64]) -> u32;
//!
//! fn scalar(words: &[u64]) -> u32 { words.iter().map(|w| w.count_ones()).sum() }
//! fn sse42_popcnt(words: &[u64]) -> u32 { scalar(words) }
//! fn avx2(words: &[u64]) -> u32 { scalar(words) }
//!
//! const POPCOUNT: Dispatcher<Popcount> = Dispatcher::with_extras(
//!   &x86::TABLE,
//!   variants![
//!     tags![] => scalar,
//!     tags![x86::SSE42, x86::POPCNT] => sse42_popcnt,
//!     tags![x86::AVX2] => avx2,
//!   ],
//!   &[x86::POPCNT],
//! );
//!
//! // Resolved once on first call, then a direct jump.
//! dispatched_fn! {
//!   pub fn popcount(words: &[u64]) -> u32 = POPCOUNT;
//! }
//!
//! assert_eq!(popcount(&[u64::MAX, 1]), 65);
//! ```
//!
//! # Compile-time Failures
//!
//! Selection problems are build errors, not runtime surprises. Two variants
//! that tie for the best match must be disambiguated with a combined variant:
//!
//! ```compile_fail
//! use isatag::prelude::*;
//!
//! const AMBIGUOUS: Dispatcher<fn() -> u32> = Dispatcher::with_extras(
//!   &x86::TABLE,
//!   variants![
//!     tags![] => || 0,
//!     tags![x86::SSE41, x86::POPCNT] => || 1,
//!     tags![x86::SSE41, x86::LZCNT] => || 2,
//!   ],
//!   &[x86::POPCNT, x86::LZCNT],
//! );
//!
//! // A CPU with both Popcnt and Lzcnt admits both variants at equal priority.
//! let f = AMBIGUOUS.select_runtime();
//! ```
//!
//! A table without a Scalar fallback does not build either:
//!
//! ```compile_fail
//! use isatag::prelude::*;
//!
//! const NO_FALLBACK: Dispatcher<fn() -> u32> =
//!   Dispatcher::base(&x86::TABLE, variants![tags![x86::SSE2] => || 2]);
//!
//! let f = NO_FALLBACK.select_runtime();
//! ```
//!
//! # Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `std` | Yes | Runtime CPU probing, `OnceLock` caches, `ISATAG_FEATURES` |
//! | `testing` | No | Replaceable [`DispatchedPointer`] for test harnesses |
//!
//! ## `no_std` Usage
//!
//! ```toml
//! [dependencies]
//! isatag = { version = "0.1", default-features = false }
//! ```
//!
//! Without `std`, runtime features equal the compile-time features unless an
//! override is installed with [`detect::set_override`].
#![cfg_attr(not(feature = "std"), no_std)]

// =============================================================================
// Tags and Features
// =============================================================================

pub use platform::{
  Arch, ArchTable, Features, NamesIn, OverrideError, ParseFeaturesError, SCALAR, Tag, TagKind, Tags, compiled_features,
  detect, is_supported, runtime_features, tag,
  tag::{arm, wasm, x86},
  tags,
};

// =============================================================================
// Selection and Dispatch
// =============================================================================

pub use dispatch::{
  DispatchedOnce, DispatchedPointer, Dispatcher, MAX_EXTRA_TAGS, OnceCache, Priority, SelectError, Selected, Variant,
  dispatched_fn, is_admissible, priority, resolve, select, select_index, select_variant, variants,
};

/// The names most users need.
pub mod prelude {
  pub use crate::{
    DispatchedOnce, DispatchedPointer, Dispatcher, Features, Tag, Tags, Variant, arm, compiled_features,
    dispatched_fn, runtime_features, select, tags, variants, wasm, x86,
  };
}

// =============================================================================
// Introspection
// =============================================================================

/// What this process was built for and what it runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlatformSummary {
  /// Architecture family of the build target.
  pub arch: Arch,
  /// Features enabled at compile time.
  pub compiled: Features,
  /// Features the dispatchers select against.
  pub runtime: Features,
  /// Whether `runtime` comes from an override.
  pub overridden: bool,
}

impl core::fmt::Display for PlatformSummary {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "{}: compiled {}, runtime {}", self.arch, self.compiled, self.runtime)?;
    if self.overridden {
      f.write_str(" (override)")?;
    }
    Ok(())
  }
}

/// Summarize the platform for diagnostics.
///
/// ```
/// let summary = isatag::platform_describe();
/// assert!(summary.runtime >= summary.compiled || summary.overridden);
/// println!("{summary}");
/// ```
#[must_use]
pub fn platform_describe() -> PlatformSummary {
  PlatformSummary {
    arch: Arch::current(),
    compiled: compiled_features(),
    runtime: runtime_features(),
    overridden: detect::has_override(),
  }
}
