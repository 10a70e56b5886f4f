//! Admissibility and priority of tag combinations.
//!
//! A variant written for `declared` may run at a call site holding
//! `call_site` when [`is_admissible`] says so. Among admissible variants, the
//! one with the highest [`priority`] wins.
//!
//! # Ranking
//!
//! ```text
//! priority = base_rank * (extra_count_of_table + 1) + popcount(extras)
//! ```
//!
//! `base_rank` is 0 for Scalar and `1 + bit` for a base tag. The multiplier
//! makes every base level outrank the one below it regardless of extras, and
//! within one level more extras win. Two combinations on the same level with
//! the same number of different extras tie; selection rejects such ties.
//!
//! ```
//! use dispatch::priority;
//! use platform::{tag::x86, tags};
//!
//! let sse41_both = priority(tags![x86::SSE41, x86::POPCNT, x86::LZCNT], &x86::TABLE);
//! let sse42 = priority(tags![x86::SSE42], &x86::TABLE);
//! assert!(sse42 > sse41_both);
//! ```

use platform::{ArchTable, Tags};

/// Rank of a tag combination within one architecture table. Higher wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Priority(u32);

impl Priority {
  /// Priority of the Scalar fallback.
  pub const FALLBACK: Self = Self(0);

  /// Raw value.
  #[inline]
  #[must_use]
  pub const fn get(self) -> u32 {
    self.0
  }
}

impl core::fmt::Display for Priority {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Priority of `tags` within `table`.
///
/// # Panics
///
/// Panics if `tags` holds more than one base tag or a tag `table` does not
/// declare. In a `const` context this is a compile error.
#[inline]
#[must_use]
pub const fn priority(tags: Tags, table: &ArchTable) -> Priority {
  let tags = tags.assert_well_formed_in(table);
  Priority(tags.base_rank() * (table.extra_count() + 1) + tags.extra_count())
}

/// Whether a variant declared for `declared` may stand in for `call_site`.
///
/// True iff both hold at most one base tag, the call site's base tag is the
/// same as or above the declared one, and every extra the variant declares is
/// present at the call site. This is a preorder: two combinations can be
/// mutually inadmissible.
#[inline]
#[must_use]
pub const fn is_admissible(declared: Tags, call_site: Tags) -> bool {
  declared.base_count() <= 1
    && call_site.base_count() <= 1
    && call_site.base_bits() >= declared.base_bits()
    && call_site.extra_bits() & declared.extra_bits() == declared.extra_bits()
}
