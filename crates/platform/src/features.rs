//! Runtime feature sets.
//!
//! [`Features`] answers "which instruction sets can run here?". Its bit layout
//! is the tag layout, so converting a [`Tag`] or a [`Tags`] combination into a
//! feature set is a plain copy of bits.
//!
//! # Set Algebra
//!
//! | Operation | Method | Operator |
//! |-----------|--------|----------|
//! | union | [`union`](Features::union) | `a \| b` |
//! | intersection | [`intersection`](Features::intersection) | `a & b` |
//! | xor | [`symmetric_difference`](Features::symmetric_difference) | `a ^ b` |
//! | complement | [`complement`](Features::complement) | `!a` |
//! | `a ⊇ b` | [`contains`](Features::contains) | `a >= b` |
//! | `a ⊆ b` | [`is_subset_of`](Features::is_subset_of) | `a <= b` |
//!
//! `PartialOrd` is the subset order: two sets that do not contain one another
//! are unordered, so `a <= b` and `a >= b` can both be false.
//!
//! ```
//! use platform::{Features, tag::x86};
//!
//! let cpu = Features::from(x86::SSE42) | x86::POPCNT;
//! assert!(cpu >= Features::from(x86::SSE42));
//! assert!(!(cpu >= Features::from(x86::LZCNT)));
//! assert!((cpu & !cpu).is_empty());
//! ```

use core::{cmp::Ordering, str::FromStr};

use crate::{
  combination::{NamesIn, Tags, write_names},
  error::ParseFeaturesError,
  tag::{ArchTable, SCALAR, Tag},
};

// ─────────────────────────────────────────────────────────────────────────────
// Core Feature Set Type
// ─────────────────────────────────────────────────────────────────────────────

/// A runtime bitmask of instruction-set tags.
///
/// The zero value is the fallback: nothing beyond plain scalar code.
///
/// # Thread Safety
///
/// `Features` is `Copy`, `Send`, and `Sync`. It can be freely shared across threads.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Features(u32);

impl Features {
  /// The fallback set: no extensions.
  pub const NONE: Self = Self(0);

  /// Reinterpret raw layout bits.
  #[inline]
  #[must_use]
  pub const fn from_bits(bits: u32) -> Self {
    Self(bits)
  }

  #[inline(always)]
  #[must_use]
  pub const fn bits(self) -> u32 {
    self.0
  }

  #[inline]
  #[must_use]
  pub const fn from_tag(tag: Tag) -> Self {
    Self(tag.index())
  }

  #[inline]
  #[must_use]
  pub const fn from_tags(tags: Tags) -> Self {
    Self(tags.bits())
  }

  /// Add one tag.
  #[inline]
  #[must_use]
  pub const fn with(self, tag: Tag) -> Self {
    Self(self.0 | tag.index())
  }

  /// Check if all features in `required` are present (`self ⊇ required`).
  ///
  /// This is the core dispatch check.
  #[inline(always)]
  #[must_use]
  pub const fn contains(self, required: Self) -> bool {
    self.0 & required.0 == required.0
  }

  /// Alias of [`contains`](Self::contains).
  #[inline(always)]
  #[must_use]
  pub const fn is_superset_of(self, other: Self) -> bool {
    self.contains(other)
  }

  /// `self ⊆ other`.
  #[inline(always)]
  #[must_use]
  pub const fn is_subset_of(self, other: Self) -> bool {
    other.contains(self)
  }

  #[inline]
  #[must_use]
  pub const fn has_tag(self, tag: Tag) -> bool {
    self.contains(Self::from_tag(tag))
  }

  /// Check whether every tag of a combination is present.
  #[inline]
  #[must_use]
  pub const fn supports(self, tags: Tags) -> bool {
    self.contains(Self::from_tags(tags))
  }

  #[inline]
  #[must_use]
  pub const fn union(self, other: Self) -> Self {
    Self(self.0 | other.0)
  }

  #[inline]
  #[must_use]
  pub const fn intersection(self, other: Self) -> Self {
    Self(self.0 & other.0)
  }

  #[inline]
  #[must_use]
  pub const fn symmetric_difference(self, other: Self) -> Self {
    Self(self.0 ^ other.0)
  }

  /// Features of `self` that are not in `other`.
  #[inline]
  #[must_use]
  pub const fn difference(self, other: Self) -> Self {
    Self(self.0 & !other.0)
  }

  /// Flips every bit of the layout, known to a table or not.
  #[inline]
  #[must_use]
  pub const fn complement(self) -> Self {
    Self(!self.0)
  }

  #[inline]
  #[must_use]
  pub const fn is_empty(self) -> bool {
    self.0 == 0
  }

  /// Truthiness: any bit beyond the fallback is set.
  #[inline]
  #[must_use]
  pub const fn any(self) -> bool {
    self.0 != 0
  }

  /// Count the number of features present.
  #[inline]
  #[must_use]
  pub const fn count(self) -> u32 {
    self.0.count_ones()
  }

  /// Keep only the bits `table` declares.
  #[inline]
  #[must_use]
  pub const fn restricted_to(self, table: &ArchTable) -> Self {
    Self(self.0 & table.known_mask())
  }

  /// Fill in every base tag below the highest one present.
  ///
  /// Probes report the hierarchy monotonically (a CPU with `Avx2` also runs
  /// `Sse2`..`Avx` code); this applies that rule to externally supplied masks.
  #[must_use]
  pub const fn normalized_in(self, table: &ArchTable) -> Self {
    let mut bits = self.0;
    let mut implied = false;
    let mut rest = table.base_tags();
    while let [lower @ .., highest] = rest {
      if implied {
        bits |= highest.index();
      } else if bits & highest.index() != 0 {
        implied = true;
      }
      rest = lower;
    }
    Self(bits)
  }

  /// The highest base tag of `table` present in the set.
  #[must_use]
  pub const fn highest_base_in(self, table: &ArchTable) -> Tag {
    let mut rest = table.base_tags();
    while let [lower @ .., highest] = rest {
      if self.0 & highest.index() != 0 {
        return *highest;
      }
      rest = lower;
    }
    SCALAR
  }

  /// Display the set with `table`'s names.
  #[inline]
  #[must_use]
  pub const fn display_in(self, table: &ArchTable) -> NamesIn<'_> {
    NamesIn::new(self.0, table)
  }

  /// Names of the present tags in `table` order.
  pub fn names_in(self, table: &ArchTable) -> impl Iterator<Item = &'static str> + use<> {
    Tags::from_bits(self.0).names_in(table)
  }

  /// Names of the present tags in native table order.
  pub fn names(self) -> impl Iterator<Item = &'static str> {
    self.names_in(ArchTable::native())
  }

  /// Parse a `|`, `,` or `+` separated list of tag names against `table`.
  ///
  /// Names are case-insensitive and surrounding whitespace is ignored.
  /// `"scalar"` is accepted and contributes no bits.
  ///
  /// ```
  /// use platform::{Features, tag::x86};
  ///
  /// let f = Features::parse_in(&x86::TABLE, "sse41 | Popcnt").unwrap();
  /// assert_eq!(f, Features::from(x86::SSE41 | x86::POPCNT));
  /// assert!(Features::parse_in(&x86::TABLE, "neon").is_err());
  /// ```
  ///
  /// # Errors
  ///
  /// [`ParseFeaturesError::Empty`] when no names are given,
  /// [`ParseFeaturesError::UnknownTag`] for the first name `table` does not know.
  pub fn parse_in(table: &ArchTable, input: &str) -> Result<Self, ParseFeaturesError> {
    let mut bits = 0u32;
    let mut any = false;
    let mut offset = 0usize;

    for token in input.split(['|', ',', '+']) {
      let start = offset + (token.len() - token.trim_start().len());
      offset += token.len() + 1;

      let name = token.trim();
      if name.is_empty() {
        continue;
      }
      any = true;

      match table.tag_by_name(name) {
        Some(tag) => bits |= tag.index(),
        None => {
          return Err(ParseFeaturesError::UnknownTag {
            offset: start,
            len: name.len(),
          });
        }
      }
    }

    if any { Ok(Self(bits)) } else { Err(ParseFeaturesError::Empty) }
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversions
// ─────────────────────────────────────────────────────────────────────────────

impl From<Tag> for Features {
  #[inline]
  fn from(tag: Tag) -> Self {
    Self::from_tag(tag)
  }
}

impl From<Tags> for Features {
  #[inline]
  fn from(tags: Tags) -> Self {
    Self::from_tags(tags)
  }
}

impl From<Features> for u32 {
  #[inline]
  fn from(features: Features) -> Self {
    features.0
  }
}

impl FromStr for Features {
  type Err = ParseFeaturesError;

  /// Parses against the native table. See [`Features::parse_in`].
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse_in(ArchTable::native(), s)
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────────────

impl<T: Into<Features>> core::ops::BitOr<T> for Features {
  type Output = Self;

  #[inline]
  fn bitor(self, rhs: T) -> Self::Output {
    self.union(rhs.into())
  }
}

impl<T: Into<Features>> core::ops::BitAnd<T> for Features {
  type Output = Self;

  #[inline]
  fn bitand(self, rhs: T) -> Self::Output {
    self.intersection(rhs.into())
  }
}

impl<T: Into<Features>> core::ops::BitXor<T> for Features {
  type Output = Self;

  #[inline]
  fn bitxor(self, rhs: T) -> Self::Output {
    self.symmetric_difference(rhs.into())
  }
}

impl core::ops::Not for Features {
  type Output = Self;

  #[inline]
  fn not(self) -> Self::Output {
    self.complement()
  }
}

impl<T: Into<Features>> core::ops::BitOrAssign<T> for Features {
  #[inline]
  fn bitor_assign(&mut self, rhs: T) {
    *self = self.union(rhs.into());
  }
}

impl<T: Into<Features>> core::ops::BitAndAssign<T> for Features {
  #[inline]
  fn bitand_assign(&mut self, rhs: T) {
    *self = self.intersection(rhs.into());
  }
}

impl<T: Into<Features>> core::ops::BitXorAssign<T> for Features {
  #[inline]
  fn bitxor_assign(&mut self, rhs: T) {
    *self = self.symmetric_difference(rhs.into());
  }
}

impl PartialOrd for Features {
  /// Subset order. `None` when neither set contains the other.
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    match (self.is_subset_of(*other), other.is_subset_of(*self)) {
      (true, true) => Some(Ordering::Equal),
      (true, false) => Some(Ordering::Less),
      (false, true) => Some(Ordering::Greater),
      (false, false) => None,
    }
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatting
// ─────────────────────────────────────────────────────────────────────────────

impl core::fmt::Debug for Features {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str("Features(")?;
    write_names(f, self.0, ArchTable::native())?;
    f.write_str(")")
  }
}

impl core::fmt::Display for Features {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write_names(f, self.0, ArchTable::native())
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────


#[cfg(all(test, not(miri)))]
mod proptests {
  extern crate alloc;

  use alloc::vec::Vec;

  use proptest::prelude::*;

  use super::*;
  use crate::tag::x86;

  /// Strategy to generate random Features values
  fn arb_features() -> impl Strategy<Value = Features> {
    any::<u32>().prop_map(Features::from_bits)
  }

  fn arb_x86_tag() -> impl Strategy<Value = Tag> {
    prop::sample::select(x86::TABLE.tags().collect::<Vec<_>>())
  }

  proptest! {
    /// Subset and superset are duals.
    #[test]
    fn features_subset_superset_dual(a in arb_features(), b in arb_features()) {
      prop_assert_eq!(a.is_subset_of(b), b.is_superset_of(a));
      prop_assert_eq!(a <= b, b >= a);
    }

    /// Union is idempotent for every tag.
    #[test]
    fn features_union_idempotent(tag in arb_x86_tag()) {
      let f = Features::from(tag);
      prop_assert_eq!(f | f, f);
    }

    /// Intersecting with the complement yields the fallback.
    #[test]
    fn features_complement_annihilates(a in arb_features()) {
      prop_assert_eq!(a & !a, Features::NONE);
      prop_assert_eq!(!!a, a);
    }

    /// Union is commutative: a | b == b | a
    #[test]
    fn features_union_commutative(a in arb_features(), b in arb_features()) {
      prop_assert_eq!(a | b, b | a);
    }

    /// Intersection distributes over union.
    #[test]
    fn features_distributive(a in arb_features(), b in arb_features(), c in arb_features()) {
      prop_assert_eq!(a & (b | c), (a & b) | (a & c));
    }

    /// Normalization is idempotent and only adds bits.
    #[test]
    fn features_normalized_idempotent(a in arb_features()) {
      let n = a.normalized_in(&x86::TABLE);
      prop_assert!(n >= a);
      prop_assert_eq!(n.normalized_in(&x86::TABLE), n);
    }

    /// partial_cmp agrees with the subset test.
    #[test]
    fn features_partial_cmp_consistent(a in arb_features(), b in arb_features()) {
      let expected = match (a.is_subset_of(b), b.is_subset_of(a)) {
        (true, true) => Some(Ordering::Equal),
        (true, false) => Some(Ordering::Less),
        (false, true) => Some(Ordering::Greater),
        (false, false) => None,
      };
      prop_assert_eq!(a.partial_cmp(&b), expected);
    }
  }
}
