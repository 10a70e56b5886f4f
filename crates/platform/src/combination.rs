//! Compile-time tag combinations.
//!
//! [`Tags`] is the union of tags a variant is written for: a base tag plus any
//! number of extras, e.g. `Sse41 | Popcnt | Lzcnt`. It is a distinct type from
//! [`Features`](crate::Features) so selection APIs only ever accept declared
//! combinations, never probe results.
//!
//! Every operation is a `const fn`, and the [`tags!`](crate::tags) macro builds
//! combinations inside `const` items:
//!
//! ```
//! use platform::{Tags, tag::x86, tags};
//!
//! const AVX2_BITS: Tags = tags![x86::AVX2, x86::POPCNT, x86::LZCNT];
//!
//! assert_eq!(AVX2_BITS.base_in(&x86::TABLE), x86::AVX2);
//! assert_eq!(AVX2_BITS.extra_count(), 2);
//!
//! let names: Vec<_> = AVX2_BITS.names_in(&x86::TABLE).collect();
//! assert_eq!(names, ["Avx2", "Popcnt", "Lzcnt"]);
//! ```

use crate::tag::{ArchTable, BASE_TAG_MASK, EXTRA_TAG_MASK, SCALAR, Tag};

/// A union of tags, usable in `const` items.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Tags(u32);

impl Tags {
  /// The fallback combination (no bits).
  pub const SCALAR: Self = Self(0);

  /// A combination holding a single tag.
  #[inline]
  #[must_use]
  pub const fn from_tag(tag: Tag) -> Self {
    Self(tag.index())
  }

  /// Reinterpret raw layout bits as a combination.
  ///
  /// No validation happens here; validity depends on the table it is used with.
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

  /// Add one tag.
  #[inline]
  #[must_use]
  pub const fn with(self, tag: Tag) -> Self {
    Self(self.0 | tag.index())
  }

  #[inline]
  #[must_use]
  pub const fn union(self, other: Self) -> Self {
    Self(self.0 | other.0)
  }

  /// True if every bit of `other` is present in `self`.
  #[inline]
  #[must_use]
  pub const fn contains(self, other: Self) -> bool {
    self.0 & other.0 == other.0
  }

  #[inline]
  #[must_use]
  pub const fn base_bits(self) -> u32 {
    self.0 & BASE_TAG_MASK
  }

  #[inline]
  #[must_use]
  pub const fn extra_bits(self) -> u32 {
    self.0 & EXTRA_TAG_MASK
  }

  /// Number of base bits. Well-formed combinations have at most one.
  #[inline]
  #[must_use]
  pub const fn base_count(self) -> u32 {
    self.base_bits().count_ones()
  }

  #[inline]
  #[must_use]
  pub const fn extra_count(self) -> u32 {
    self.extra_bits().count_ones()
  }

  /// The combination's base tag as a raw layout rank: 0 for Scalar, 1 + bit position otherwise.
  ///
  /// With several base bits the highest one wins; [`is_well_formed_in`](Self::is_well_formed_in)
  /// rejects such combinations before a rank is ever used.
  #[inline]
  #[must_use]
  pub const fn base_rank(self) -> u32 {
    32 - self.base_bits().leading_zeros()
  }

  /// The combination's base tag looked up in the native table.
  ///
  /// Returns [`SCALAR`] when there is no base bit or the bit is unknown to the target.
  #[inline]
  #[must_use]
  pub const fn base(self) -> Tag {
    self.base_in(ArchTable::native())
  }

  /// The combination's base tag looked up in `table`.
  #[must_use]
  pub const fn base_in(self, table: &ArchTable) -> Tag {
    let rank = self.base_rank();
    if rank == 0 {
      return SCALAR;
    }
    match table.tag_for_bit(1 << (rank - 1)) {
      Some(tag) => tag,
      None => SCALAR,
    }
  }

  /// True if the combination has at most one base bit and only uses bits `table` declares.
  #[inline]
  #[must_use]
  pub const fn is_well_formed_in(self, table: &ArchTable) -> bool {
    self.base_count() <= 1 && self.0 & !table.known_mask() == 0
  }

  /// Identity that fails const evaluation on a malformed combination.
  ///
  /// # Panics
  ///
  /// Panics if the combination holds more than one base bit, or any bit that
  /// `table` does not declare (including extras beyond its extra count).
  #[must_use]
  pub const fn assert_well_formed_in(self, table: &ArchTable) -> Self {
    assert!(
      self.base_count() <= 1,
      "a tag combination may hold at most one base tag"
    );
    assert!(
      self.extra_bits() & !table.extra_mask() == 0,
      "extra tag outside the architecture's declared extras"
    );
    assert!(
      self.base_bits() & !table.base_mask() == 0,
      "base tag unknown to the architecture"
    );
    self
  }

  /// Display the combination with `table`'s names.
  #[inline]
  #[must_use]
  pub const fn display_in(self, table: &ArchTable) -> NamesIn<'_> {
    NamesIn::new(self.0, table)
  }

  /// Names of the tags in `table` order. Empty for Scalar.
  pub fn names_in(self, table: &ArchTable) -> impl Iterator<Item = &'static str> + use<> {
    table
      .tags()
      .filter(move |tag| self.0 & tag.index() != 0)
      .map(Tag::name)
  }
}

/// Build a [`Tags`] value from a list of tags in a const context.
///
/// ```
/// use platform::{Tags, tag::x86, tags};
///
/// const SCALAR: Tags = tags![];
/// const SSE41_POPCNT: Tags = tags![x86::SSE41, x86::POPCNT];
///
/// assert_eq!(SCALAR, Tags::SCALAR);
/// assert_eq!(SSE41_POPCNT.bits(), (1 << 3) | (1 << 16));
/// ```
#[macro_export]
macro_rules! tags {
  ($($tag:expr),* $(,)?) => {
    $crate::Tags::SCALAR$(.with($tag))*
  };
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversions and Operators
// ─────────────────────────────────────────────────────────────────────────────

impl From<Tag> for Tags {
  #[inline]
  fn from(tag: Tag) -> Self {
    Self::from_tag(tag)
  }
}

impl From<Tags> for u32 {
  #[inline]
  fn from(tags: Tags) -> Self {
    tags.0
  }
}

impl core::ops::BitOr for Tags {
  type Output = Self;

  #[inline]
  fn bitor(self, rhs: Self) -> Self::Output {
    self.union(rhs)
  }
}

impl core::ops::BitOr<Tag> for Tags {
  type Output = Self;

  #[inline]
  fn bitor(self, rhs: Tag) -> Self::Output {
    self.with(rhs)
  }
}

impl core::ops::BitOr for Tag {
  type Output = Tags;

  #[inline]
  fn bitor(self, rhs: Self) -> Self::Output {
    Tags::from_tag(self).with(rhs)
  }
}

impl core::ops::BitOrAssign<Tag> for Tags {
  #[inline]
  fn bitor_assign(&mut self, rhs: Tag) {
    *self = self.with(rhs);
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatting
// ─────────────────────────────────────────────────────────────────────────────

/// Writes `A|B|C` for the bits of `bits` known to `table`, `Scalar` when there
/// are none, and any leftover unknown bits as hex.
pub(crate) fn write_names(f: &mut core::fmt::Formatter<'_>, bits: u32, table: &ArchTable) -> core::fmt::Result {
  let mut first = true;
  for tag in table.tags().filter(|tag| bits & tag.index() != 0) {
    if !first {
      f.write_str("|")?;
    }
    first = false;
    f.write_str(tag.name())?;
  }

  let unknown = bits & !table.known_mask();
  if unknown != 0 {
    if !first {
      f.write_str("|")?;
    }
    first = false;
    write!(f, "{unknown:#x}")?;
  }

  if first { f.write_str(SCALAR.name()) } else { Ok(()) }
}

/// Renders bits with the names of one table.
///
/// `Display` on [`Tags`] and [`Features`](crate::Features) uses the native
/// table; this names bits for whichever architecture they belong to.
///
/// ```
/// use platform::{Features, tag::arm};
///
/// let neon = Features::from(arm::NEON) | arm::NEON_FMA;
/// assert_eq!(neon.display_in(&arm::TABLE).to_string(), "Neon|NeonFma");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct NamesIn<'a> {
  bits: u32,
  table: &'a ArchTable,
}

impl<'a> NamesIn<'a> {
  #[inline]
  #[must_use]
  pub(crate) const fn new(bits: u32, table: &'a ArchTable) -> Self {
    Self { bits, table }
  }
}

impl core::fmt::Display for NamesIn<'_> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write_names(f, self.bits, self.table)
  }
}

impl core::fmt::Display for Tags {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write_names(f, self.0, ArchTable::native())
  }
}

impl core::fmt::Debug for Tags {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str("Tags(")?;
    write_names(f, self.0, ArchTable::native())?;
    f.write_str(")")
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
