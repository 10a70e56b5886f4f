//! Variant tables and best-variant selection.
//!
//! This module provides the selection primitives:
//!
//! - [`Variant`]: an implementation and the tag combination it was written for
//! - [`resolve`]: fallible selection, usable at compile time and at runtime
//! - [`select_index`] / [`select_variant`]: panicking forms for `const` items
//! - [`Selected`]: a selection result for diagnostics
//!
//! # Compile-time selection
//!
//! Evaluated inside `const`, the panicking forms turn an ambiguous table or
//! a missing fallback into a build error. The [`select!`](crate::select!)
//! macro wraps this:
//!
//! ```
//! use dispatch::{Variant, select, variants};
//! use platform::{tag::x86, tags};
//!
//! fn scalar() -> &'static str { "scalar" }
//! fn sse41() -> &'static str { "sse41" }
//!
//! const VARIANTS: &[Variant<fn() -> &'static str>] = variants![
//!   tags![] => scalar,
//!   tags![x86::SSE41] => sse41,
//! ];
//!
//! let f = select!(&x86::TABLE, VARIANTS, tags![x86::AVX, x86::POPCNT]);
//! assert_eq!(f(), "sse41");
//! ```

use platform::{ArchTable, Tags};

use crate::priority::{is_admissible, priority};

// ─────────────────────────────────────────────────────────────────────────────
// Core Types
// ─────────────────────────────────────────────────────────────────────────────

/// An implementation variant and the tag combination it requires.
///
/// Variant order in a table carries no meaning; ranking decides.
#[derive(Clone, Copy, Debug)]
pub struct Variant<F> {
  /// Combination the variant was written for.
  pub tags: Tags,
  /// The implementation.
  pub func: F,
}

impl<F> Variant<F> {
  #[inline]
  #[must_use]
  pub const fn new(tags: Tags, func: F) -> Self {
    Self { tags, func }
  }
}

/// The result of a selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selected<F> {
  /// Combination of the chosen variant.
  pub tags: Tags,
  /// The chosen implementation.
  pub func: F,
}

impl<F> Selected<F> {
  #[inline]
  #[must_use]
  pub const fn new(tags: Tags, func: F) -> Self {
    Self { tags, func }
  }
}

/// Names the tags with the native table; use
/// [`Tags::display_in`](platform::Tags::display_in) for a dispatcher built on
/// another architecture's table.
impl<F> core::fmt::Display for Selected<F> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    core::fmt::Display::fmt(&self.tags, f)
  }
}

/// Why a selection failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectError {
  /// Two admissible variants share the highest priority.
  Ambiguous {
    /// The first tied variant in table order.
    first: Tags,
    /// The second tied variant in table order.
    second: Tags,
  },
  /// No variant may run at the call site. Tables need a Scalar fallback.
  NoAdmissibleVariant,
}

impl core::fmt::Display for SelectError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Self::Ambiguous { first, second } => {
        write!(f, "ambiguous selection between {first} and {second}")
      }
      Self::NoAdmissibleVariant => f.write_str("no admissible variant (missing fallback)"),
    }
  }
}

impl core::error::Error for SelectError {}

// ─────────────────────────────────────────────────────────────────────────────
// Selection
// ─────────────────────────────────────────────────────────────────────────────

/// Scan `variants` for the best admissible one, returning its position too.
const fn scan<'a, F>(
  table: &ArchTable,
  variants: &'a [Variant<F>],
  call_site: Tags,
) -> Result<(usize, &'a Variant<F>), SelectError> {
  let mut best: Option<(usize, &'a Variant<F>)> = None;
  let mut best_priority = 0u32;
  let mut tied: Option<&'a Variant<F>> = None;

  let mut index = 0usize;
  let mut rest = variants;
  while let [variant, tail @ ..] = rest {
    if is_admissible(variant.tags, call_site) {
      let rank = priority(variant.tags, table).get();
      if best.is_none() || rank > best_priority {
        best = Some((index, variant));
        best_priority = rank;
        tied = None;
      } else if rank == best_priority && tied.is_none() {
        tied = Some(variant);
      }
    }
    index += 1;
    rest = tail;
  }

  match (best, tied) {
    (Some((_, first)), Some(second)) => Err(SelectError::Ambiguous {
      first: first.tags,
      second: second.tags,
    }),
    (Some(found), None) => Ok(found),
    (None, _) => Err(SelectError::NoAdmissibleVariant),
  }
}

/// Select the highest-priority variant admissible at `call_site`.
///
/// # Errors
///
/// [`SelectError::Ambiguous`] if two admissible variants tie for the highest
/// priority, [`SelectError::NoAdmissibleVariant`] if none is admissible.
///
/// # Panics
///
/// Panics if a variant's combination is malformed for `table`.
pub const fn resolve<'a, F>(
  table: &ArchTable,
  variants: &'a [Variant<F>],
  call_site: Tags,
) -> Result<&'a Variant<F>, SelectError> {
  match scan(table, variants, call_site) {
    Ok((_, variant)) => Ok(variant),
    Err(err) => Err(err),
  }
}

/// Position of the highest-priority variant admissible at `call_site`.
///
/// # Panics
///
/// Panics on an ambiguous selection, a missing fallback, or a malformed
/// combination. In a `const` context each of these is a compile error.
#[must_use]
pub const fn select_index<F>(table: &ArchTable, variants: &[Variant<F>], call_site: Tags) -> usize {
  match scan(table, variants, call_site) {
    Ok((index, _)) => index,
    Err(err) => fail(err),
  }
}

/// The highest-priority variant admissible at `call_site`.
///
/// # Panics
///
/// Same conditions as [`select_index`].
#[must_use]
pub const fn select_variant<'a, F>(table: &ArchTable, variants: &'a [Variant<F>], call_site: Tags) -> &'a Variant<F> {
  match scan(table, variants, call_site) {
    Ok((_, variant)) => variant,
    Err(err) => fail(err),
  }
}

#[track_caller]
pub(crate) const fn fail(err: SelectError) -> ! {
  match err {
    SelectError::Ambiguous { .. } => {
      panic!("ambiguous selection: two admissible variants share the highest priority")
    }
    SelectError::NoAdmissibleVariant => panic!("no admissible variant: missing Scalar fallback"),
  }
}
