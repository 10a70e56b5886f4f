//! Dispatch crate: priority-ranked selection of instruction-set variants.
//!
//! An algorithm is written several times, once per instruction-set
//! combination it targets. Each version is a [`Variant`]: a function pointer
//! plus the [`Tags`](platform::Tags) it was written for. This crate picks the
//! best variant for a given call site:
//!
//! - **Priority**: [`priority()`] ranks combinations (higher base tag first, then more extras) and
//!   [`is_admissible()`] decides whether a variant may run at a call site.
//! - **Compile-time selection**: [`select_index`] and the [`select!`] macro run the ranking in const
//!   evaluation, so ambiguity or a missing fallback fails the build.
//! - **Runtime dispatch**: a [`Dispatcher`] maps any [`Features`](platform::Features) value to a call
//!   site and selects against it.
//!
//! # Materialization
//!
//! Three ways to turn a dispatcher into a call, all picking the same variant
//! for the same features:
//!
//! 1. **Direct call**: [`Dispatcher::select`] with features of your choosing (also `const`).
//! 2. **Cached pointer**: [`DispatchedPointer`] resolves on first use and can be replaced in tests.
//! 3. **Resolved once**: [`DispatchedOnce`] and [`dispatched_fn!`] resolve on first use and never
//!    change afterwards.
//!
//! # Usage
//!
//! ```
//! use dispatch::{Dispatcher, Variant, variants};
//! use platform::{tag::x86, tags};
//!
//! type Kernel = fn(u32) -> u32;
//!
//! fn scalar(x: u32) -> u32 { x }
//! fn sse41(x: u32) -> u32 { x + 1 }
//! fn avx2(x: u32) -> u32 { x + 2 }
//!
//! const VARIANTS: &[Variant<Kernel>] = variants![
//!   tags![] => scalar,
//!   tags![x86::SSE41] => sse41,
//!   tags![x86::AVX2] => avx2,
//! ];
//!
//! static DISPATCHER: Dispatcher<Kernel> = Dispatcher::base(&x86::TABLE, VARIANTS);
//!
//! let cpu = platform::Features::from(x86::SSE42).normalized_in(&x86::TABLE);
//! assert_eq!((DISPATCHER.select(cpu))(1), 2);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::indexing_slicing))]
#![no_std]

#[cfg(feature = "std")]
extern crate std;

pub mod cache;
pub mod dispatcher;
mod macros;
pub mod priority;
pub mod select;

pub use cache::{DispatchedOnce, DispatchedPointer, OnceCache};
pub use dispatcher::{Dispatcher, MAX_EXTRA_TAGS};
// Re-export platform types for convenience.
pub use platform;
pub use priority::{Priority, is_admissible, priority};
pub use select::{SelectError, Selected, Variant, resolve, select_index, select_variant};
