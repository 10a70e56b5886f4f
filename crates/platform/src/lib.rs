//! Instruction-set tags, feature sets, and CPU detection for isatag.
//!
//! This crate is the **single source of truth** for "what can this machine
//! run?" across the isatag workspace.
//!
//! # Core Types
//!
//! - [`Tag`]: one instruction-set extension (`Sse41`, `Popcnt`, `Neon`, ...)
//! - [`Tags`]: the combination a code variant is written for
//! - [`Features`]: what the running process may execute
//! - [`ArchTable`]: the fixed tag vocabulary of one architecture family
//!
//! # Main Entry Points
//!
//! ```
//! use platform::{Features, compiled_features, runtime_features};
//!
//! // What the binary was compiled for. Usable in const contexts.
//! const COMPILED: Features = compiled_features();
//!
//! // What the CPU reports, cached after the first call.
//! let runtime = runtime_features();
//! assert!(runtime >= COMPILED || platform::detect::has_override());
//! ```
//!
//! # Design Philosophy
//!
//! 1. **One layout**: tags, combinations and feature sets share a 32-bit layout (base tags in the
//!    low half, extras in the high half), so conversions are plain bit copies.
//! 2. **Zero-cost when possible**: compile-time features come from `cfg!`, and every set operation
//!    is a `const fn`.
//! 3. **Cached otherwise**: runtime detection is cached in `OnceLock` (std) or atomics (no_std).
//! 4. **Miri-safe**: under Miri, detection never executes CPUID.

#![no_std]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::indexing_slicing))]

#[cfg(feature = "std")]
extern crate std;

// ─────────────────────────────────────────────────────────────────────────────
// Core modules
// ─────────────────────────────────────────────────────────────────────────────

mod combination;
pub mod detect;
pub mod error;
mod features;
pub mod tag;

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

pub use combination::{NamesIn, Tags};
pub use detect::{compiled_features, runtime_features};
pub use error::{OverrideError, ParseFeaturesError};
pub use features::Features;
pub use tag::{Arch, ArchTable, SCALAR, Tag, TagKind};

/// Whether `tags` can run on the current CPU.
///
/// Shorthand for `runtime_features().supports(tags)`.
///
/// ```
/// assert!(platform::is_supported(platform::Tags::SCALAR));
/// ```
#[inline]
#[must_use]
pub fn is_supported(tags: Tags) -> bool {
  runtime_features().supports(tags)
}
