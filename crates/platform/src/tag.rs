//! Instruction-set tags and per-architecture tag tables.
//!
//! A [`Tag`] names one instruction-set extension and owns exactly one bit of
//! the shared 32-bit layout used by [`Tags`](crate::Tags) and
//! [`Features`](crate::Features).
//!
//! # Bit Layout
//!
//! - Bits 0-15: base tags. Each architecture orders its base tags in a strict hierarchy and a higher
//!   bit always means a more capable instruction set (`Avx2` implies everything `Sse2`..`Avx` can do).
//! - Bits 16-31: extra tags. Orthogonal to the hierarchy and to each other (`Popcnt`, `Lzcnt`, ...).
//! - No bits: [`SCALAR`], the universal fallback.
//!
//! Bits are only unique within one [`ArchTable`]: `x86::SSE2` and `arm::NEON`
//! share bit 0. A table is fixed data and is never configurable.
//!
//! # Usage
//!
//! ```
//! use platform::tag::{ArchTable, TagKind, x86};
//!
//! assert_eq!(x86::AVX2.name(), "Avx2");
//! assert_eq!(x86::POPCNT.kind(), TagKind::Extra);
//! assert_eq!(x86::TABLE.highest_base(), x86::AVX512F);
//! assert_eq!(x86::TABLE.tag_by_name("sse41"), Some(x86::SSE41));
//! ```

// ─────────────────────────────────────────────────────────────────────────────
// Layout Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Mask covering every bit a base tag may occupy.
pub const BASE_TAG_MASK: u32 = (1 << 16) - 1;

/// Mask covering every bit an extra tag may occupy.
pub const EXTRA_TAG_MASK: u32 = !BASE_TAG_MASK;

/// First bit used by extra tags.
pub const EXTRA_TAG_BIT_OFFSET: u32 = 16;

/// The universal fallback tag. Never has any bits set.
pub const SCALAR: Tag = Tag::new(0, "Scalar");

// ─────────────────────────────────────────────────────────────────────────────
// Tag
// ─────────────────────────────────────────────────────────────────────────────

/// Where a tag sits in the layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagKind {
  /// The fallback tag.
  Scalar,
  /// Member of the architecture's ordered hierarchy.
  Base,
  /// Orthogonal extension.
  Extra,
}

/// One instruction-set extension.
///
/// Tags are plain constants. Combine them with [`tags!`](crate::tags) in const
/// contexts or with `|` at runtime.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
  index: u32,
  name: &'static str,
}

impl Tag {
  /// Create a tag from a raw index.
  ///
  /// # Panics
  ///
  /// Panics (at compile time, in a const context) if `index` has more than one bit set.
  #[inline]
  #[must_use]
  pub const fn new(index: u32, name: &'static str) -> Self {
    assert!(index.count_ones() <= 1, "a tag owns at most one bit");
    Self { index, name }
  }

  /// Create the base tag sitting at hierarchy position `position` (0 = lowest above Scalar).
  #[inline]
  #[must_use]
  pub const fn base(position: u32, name: &'static str) -> Self {
    assert!(position < EXTRA_TAG_BIT_OFFSET, "base tags live in bits 0-15");
    Self::new(1 << position, name)
  }

  /// Create the extra tag with ordinal `ordinal` (0 = first extra of the architecture).
  #[inline]
  #[must_use]
  pub const fn extra(ordinal: u32, name: &'static str) -> Self {
    assert!(ordinal < 32 - EXTRA_TAG_BIT_OFFSET, "extra tags live in bits 16-31");
    Self::new(1 << (EXTRA_TAG_BIT_OFFSET + ordinal), name)
  }

  /// The tag's single bit (0 for [`SCALAR`]).
  #[inline(always)]
  #[must_use]
  pub const fn index(self) -> u32 {
    self.index
  }

  /// Display name, e.g. `"Sse41"`.
  #[inline]
  #[must_use]
  pub const fn name(self) -> &'static str {
    self.name
  }

  #[inline]
  #[must_use]
  pub const fn kind(self) -> TagKind {
    if self.index == 0 {
      TagKind::Scalar
    } else if self.index & BASE_TAG_MASK != 0 {
      TagKind::Base
    } else {
      TagKind::Extra
    }
  }

  #[inline]
  #[must_use]
  pub const fn is_base(self) -> bool {
    matches!(self.kind(), TagKind::Base)
  }

  #[inline]
  #[must_use]
  pub const fn is_extra(self) -> bool {
    matches!(self.kind(), TagKind::Extra)
  }
}

impl core::fmt::Debug for Tag {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "Tag({}, {:#x})", self.name, self.index)
  }
}

impl core::fmt::Display for Tag {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str(self.name)
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Architecture Identification
// ─────────────────────────────────────────────────────────────────────────────

/// Architecture family a tag table describes.
///
/// 32- and 64-bit variants of one family share a table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Arch {
  X86,
  Arm,
  Wasm,
  #[default]
  Other,
}

impl Arch {
  /// Get the architecture family of the current compilation target.
  #[inline]
  #[must_use]
  pub const fn current() -> Self {
    #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
    {
      Self::X86
    }
    #[cfg(any(target_arch = "aarch64", target_arch = "arm"))]
    {
      Self::Arm
    }
    #[cfg(any(target_arch = "wasm32", target_arch = "wasm64"))]
    {
      Self::Wasm
    }
    #[cfg(not(any(
      target_arch = "x86_64",
      target_arch = "x86",
      target_arch = "aarch64",
      target_arch = "arm",
      target_arch = "wasm32",
      target_arch = "wasm64"
    )))]
    {
      Self::Other
    }
  }

  /// Returns the human-readable name for this architecture family.
  #[inline]
  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::X86 => "x86",
      Self::Arm => "arm",
      Self::Wasm => "wasm",
      Self::Other => "other",
    }
  }

  /// The tag table describing this family.
  #[inline]
  #[must_use]
  pub const fn table(self) -> &'static ArchTable {
    match self {
      Self::X86 => &x86::TABLE,
      Self::Arm => &arm::TABLE,
      Self::Wasm => &wasm::TABLE,
      Self::Other => &generic::TABLE,
    }
  }
}

impl core::fmt::Display for Arch {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str(self.name())
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Architecture Tables
// ─────────────────────────────────────────────────────────────────────────────

/// The fixed tag vocabulary of one architecture family.
///
/// `base` is ordered lowest to highest and its bits must ascend. `extra` lists
/// the orthogonal tags by ordinal, so extra `n` owns bit `16 + n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArchTable {
  arch: Arch,
  base: &'static [Tag],
  extra: &'static [Tag],
}

impl ArchTable {
  /// Build a table, checking the layout invariants.
  ///
  /// # Panics
  ///
  /// Panics if base tags are not strictly ascending single base bits, or if
  /// extra tag `n` does not own bit `16 + n`.
  #[must_use]
  pub const fn new(arch: Arch, base: &'static [Tag], extra: &'static [Tag]) -> Self {
    let mut previous = 0u32;
    let mut rest = base;
    while let [tag, tail @ ..] = rest {
      assert!(tag.is_base(), "base list may only hold base tags");
      assert!(tag.index > previous, "base tags must ascend with the hierarchy");
      previous = tag.index;
      rest = tail;
    }

    let mut ordinal = 0u32;
    let mut rest = extra;
    while let [tag, tail @ ..] = rest {
      assert!(
        tag.index == 1 << (EXTRA_TAG_BIT_OFFSET + ordinal),
        "extra tag n must own bit 16 + n"
      );
      ordinal += 1;
      rest = tail;
    }

    Self { arch, base, extra }
  }

  /// The table matching the compilation target.
  #[inline]
  #[must_use]
  pub const fn native() -> &'static Self {
    Arch::current().table()
  }

  #[inline]
  #[must_use]
  pub const fn arch(&self) -> Arch {
    self.arch
  }

  /// Base tags, lowest first. [`SCALAR`] is implicit and not listed.
  #[inline]
  #[must_use]
  pub const fn base_tags(&self) -> &'static [Tag] {
    self.base
  }

  /// Extra tags in ordinal order.
  #[inline]
  #[must_use]
  pub const fn extra_tags(&self) -> &'static [Tag] {
    self.extra
  }

  /// Number of extra tags this architecture declares.
  #[inline]
  #[must_use]
  pub const fn extra_count(&self) -> u32 {
    self.extra.len() as u32
  }

  /// Bits owned by this table's base tags.
  #[must_use]
  pub const fn base_mask(&self) -> u32 {
    let mut mask = 0;
    let mut rest = self.base;
    while let [tag, tail @ ..] = rest {
      mask |= tag.index;
      rest = tail;
    }
    mask
  }

  /// Bits owned by this table's extra tags.
  #[inline]
  #[must_use]
  pub const fn extra_mask(&self) -> u32 {
    (((1u64 << self.extra_count()) - 1) as u32) << EXTRA_TAG_BIT_OFFSET
  }

  /// Every bit this table knows about.
  #[inline]
  #[must_use]
  pub const fn known_mask(&self) -> u32 {
    self.base_mask() | self.extra_mask()
  }

  /// The most capable base tag, or [`SCALAR`] for tables without any.
  #[inline]
  #[must_use]
  pub const fn highest_base(&self) -> Tag {
    match self.base.last() {
      Some(tag) => *tag,
      None => SCALAR,
    }
  }

  /// Look up the tag owning `index` (which must be a single bit, or 0 for Scalar).
  #[must_use]
  pub const fn tag_for_bit(&self, index: u32) -> Option<Tag> {
    if index == 0 {
      return Some(SCALAR);
    }
    let mut rest = self.base;
    while let [tag, tail @ ..] = rest {
      if tag.index == index {
        return Some(*tag);
      }
      rest = tail;
    }
    let mut rest = self.extra;
    while let [tag, tail @ ..] = rest {
      if tag.index == index {
        return Some(*tag);
      }
      rest = tail;
    }
    None
  }

  /// Display name for a single bit (diagnostics).
  #[inline]
  #[must_use]
  pub const fn name_of(&self, index: u32) -> Option<&'static str> {
    match self.tag_for_bit(index) {
      Some(tag) => Some(tag.name),
      None => None,
    }
  }

  /// Case-insensitive lookup by display name. `"scalar"` resolves to [`SCALAR`].
  #[must_use]
  pub fn tag_by_name(&self, name: &str) -> Option<Tag> {
    core::iter::once(SCALAR)
      .chain(self.tags())
      .find(|tag| tag.name.eq_ignore_ascii_case(name))
  }

  /// Every tag of the table in architecture order: base tags ascending, then extras.
  #[inline]
  pub fn tags(&self) -> impl Iterator<Item = Tag> + Clone + use<> {
    self.base.iter().chain(self.extra.iter()).copied()
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// x86/x86_64 Tags
// ─────────────────────────────────────────────────────────────────────────────

/// x86/x86_64 tags.
///
/// Base hierarchy: Sse2 < Sse3 < Ssse3 < Sse41 < Sse42 < Avx < Avx2 < Avx512f.
pub mod x86 {
  use super::{Arch, ArchTable, Tag};

  // ─── Base hierarchy ───
  pub const SSE2: Tag = Tag::base(0, "Sse2");
  pub const SSE3: Tag = Tag::base(1, "Sse3");
  pub const SSSE3: Tag = Tag::base(2, "Ssse3");
  pub const SSE41: Tag = Tag::base(3, "Sse41");
  pub const SSE42: Tag = Tag::base(4, "Sse42");
  pub const AVX: Tag = Tag::base(5, "Avx");
  pub const AVX2: Tag = Tag::base(6, "Avx2");
  /// AVX-512 Foundation.
  pub const AVX512F: Tag = Tag::base(7, "Avx512f");

  // ─── Extras ───
  pub const POPCNT: Tag = Tag::extra(0, "Popcnt");
  pub const LZCNT: Tag = Tag::extra(1, "Lzcnt");
  /// Half-float conversions. Needs OS AVX state like every VEX-encoded extension.
  pub const AVX_F16C: Tag = Tag::extra(2, "AvxF16c");
  /// Fused multiply-add (FMA3).
  pub const AVX_FMA: Tag = Tag::extra(3, "AvxFma");

  pub const BASE: [Tag; 8] = [SSE2, SSE3, SSSE3, SSE41, SSE42, AVX, AVX2, AVX512F];
  pub const EXTRA: [Tag; 4] = [POPCNT, LZCNT, AVX_F16C, AVX_FMA];

  pub const TABLE: ArchTable = ArchTable::new(Arch::X86, &BASE, &EXTRA);
}

// ─────────────────────────────────────────────────────────────────────────────
// ARM/AArch64 Tags
// ─────────────────────────────────────────────────────────────────────────────

/// ARM/AArch64 tags. No extras.
pub mod arm {
  use super::{Arch, ArchTable, Tag};

  pub const NEON: Tag = Tag::base(0, "Neon");
  /// NEON with fused multiply-add (VFPv4 on 32-bit ARM, baseline on AArch64).
  pub const NEON_FMA: Tag = Tag::base(1, "NeonFma");
  /// NEON with half-precision arithmetic.
  pub const NEON_FP16: Tag = Tag::base(2, "NeonFp16");

  pub const BASE: [Tag; 3] = [NEON, NEON_FMA, NEON_FP16];

  pub const TABLE: ArchTable = ArchTable::new(Arch::Arm, &BASE, &[]);
}

// ─────────────────────────────────────────────────────────────────────────────
// WebAssembly Tags
// ─────────────────────────────────────────────────────────────────────────────

/// WebAssembly tags.
pub mod wasm {
  use super::{Arch, ArchTable, Tag};

  pub const SIMD128: Tag = Tag::base(0, "Simd128");

  pub const BASE: [Tag; 1] = [SIMD128];

  pub const TABLE: ArchTable = ArchTable::new(Arch::Wasm, &BASE, &[]);
}

/// Table for architectures without known tags: only [`SCALAR`] exists.
pub mod generic {
  use super::{Arch, ArchTable};

  pub const TABLE: ArchTable = ArchTable::new(Arch::Other, &[], &[]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  extern crate alloc;

  use alloc::vec::Vec;

  use super::*;

  #[test]
  fn test_x86_bit_positions() {
    assert_eq!(x86::SSE2.index(), 1 << 0);
    assert_eq!(x86::SSE41.index(), 1 << 3);
    assert_eq!(x86::AVX512F.index(), 1 << 7);
    assert_eq!(x86::POPCNT.index(), 1 << 16);
    assert_eq!(x86::LZCNT.index(), 1 << 17);
    assert_eq!(x86::AVX_F16C.index(), 1 << 18);
    assert_eq!(x86::AVX_FMA.index(), 1 << 19);
  }

  #[test]
  fn test_arm_and_wasm_bit_positions() {
    assert_eq!(arm::NEON.index(), 1);
    assert_eq!(arm::NEON_FMA.index(), 2);
    assert_eq!(arm::NEON_FP16.index(), 4);
    assert_eq!(wasm::SIMD128.index(), 1);
  }

  #[test]
  fn test_kinds() {
    assert_eq!(SCALAR.kind(), TagKind::Scalar);
    assert_eq!(x86::AVX.kind(), TagKind::Base);
    assert_eq!(x86::LZCNT.kind(), TagKind::Extra);
    assert!(arm::NEON_FP16.is_base());
    assert!(!SCALAR.is_extra());
  }

  #[test]
  fn test_masks() {
    assert_eq!(x86::TABLE.base_mask(), 0xFF);
    assert_eq!(x86::TABLE.extra_mask(), 0xF << 16);
    assert_eq!(x86::TABLE.extra_count(), 4);
    assert_eq!(arm::TABLE.extra_mask(), 0);
    assert_eq!(arm::TABLE.base_mask(), 0b111);
    assert_eq!(generic::TABLE.known_mask(), 0);
    assert_eq!(BASE_TAG_MASK & EXTRA_TAG_MASK, 0);
  }

  #[test]
  fn test_highest_base() {
    assert_eq!(x86::TABLE.highest_base(), x86::AVX512F);
    assert_eq!(arm::TABLE.highest_base(), arm::NEON_FP16);
    assert_eq!(wasm::TABLE.highest_base(), wasm::SIMD128);
    assert_eq!(generic::TABLE.highest_base(), SCALAR);
  }

  #[test]
  fn test_names() {
    let names: Vec<_> = x86::TABLE.tags().map(Tag::name).collect();
    assert_eq!(
      names,
      [
        "Sse2", "Sse3", "Ssse3", "Sse41", "Sse42", "Avx", "Avx2", "Avx512f", "Popcnt", "Lzcnt", "AvxF16c", "AvxFma"
      ]
    );
    assert_eq!(x86::TABLE.name_of(1 << 17), Some("Lzcnt"));
    assert_eq!(x86::TABLE.name_of(0), Some("Scalar"));
    assert_eq!(x86::TABLE.name_of(1 << 12), None);
  }

  #[test]
  fn test_tag_by_name() {
    assert_eq!(x86::TABLE.tag_by_name("AVX2"), Some(x86::AVX2));
    assert_eq!(x86::TABLE.tag_by_name("avxfma"), Some(x86::AVX_FMA));
    assert_eq!(x86::TABLE.tag_by_name("scalar"), Some(SCALAR));
    assert_eq!(x86::TABLE.tag_by_name("neon"), None);
    assert_eq!(arm::TABLE.tag_by_name("NeonFp16"), Some(arm::NEON_FP16));
  }

  #[test]
  fn test_arch_current() {
    let arch = Arch::current();
    #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
    assert_eq!(arch, Arch::X86);
    #[cfg(target_arch = "aarch64")]
    assert_eq!(arch, Arch::Arm);
    assert_eq!(ArchTable::native().arch(), arch);
    assert_eq!(arch.table().arch(), arch);
  }

  #[test]
  fn test_display() {
    assert_eq!(alloc::format!("{}", x86::SSE41), "Sse41");
    assert_eq!(alloc::format!("{:?}", x86::POPCNT), "Tag(Popcnt, 0x10000)");
    assert_eq!(alloc::format!("{}", Arch::Wasm), "wasm");
  }
}
