//! Runtime dispatch over a variant table.
//!
//! A [`Dispatcher`] turns any [`Features`] value into a call site and selects
//! the best variant for it. Construction is `const` and checks, at compile
//! time, that every call site the dispatcher can ever produce resolves
//! unambiguously.
//!
//! # Call sites
//!
//! For a feature set, the call site is built in two steps:
//!
//! 1. Collect the listed extras present in the set.
//! 2. Walk the base tags from highest to lowest and take the first one the set supports together
//!    with those extras. Without one, the call site is Scalar plus the extras.
//!
//! ```
//! use dispatch::{Dispatcher, Variant, variants};
//! use platform::{Features, tag::x86, tags};
//!
//! type Kernel = fn() -> &'static str;
//!
//! const VARIANTS: &[Variant<Kernel>] = variants![
//!   tags![] => || "scalar",
//!   tags![x86::SSE41, x86::POPCNT] => || "sse41+popcnt",
//!   tags![x86::AVX2] => || "avx2",
//! ];
//! static POPCOUNT: Dispatcher<Kernel> =
//!   Dispatcher::with_extras(&x86::TABLE, VARIANTS, &[x86::POPCNT]);
//!
//! let cpu = (Features::from(x86::SSE42) | x86::POPCNT | x86::LZCNT).normalized_in(&x86::TABLE);
//! assert_eq!(POPCOUNT.call_site(cpu), tags![x86::SSE42, x86::POPCNT]);
//! assert_eq!((POPCOUNT.select(cpu))(), "sse41+popcnt");
//! ```

use platform::{ArchTable, Features, Tag, Tags, detect};

use crate::select::{SelectError, Selected, Variant, fail, resolve, select_variant};

/// Most extra tags a dispatcher may consider. Bounds the validation work at
/// `2^7` extra subsets per base level.
pub const MAX_EXTRA_TAGS: usize = 7;

/// Selects among `variants` for any feature set.
#[derive(Clone, Copy, Debug)]
pub struct Dispatcher<F: 'static> {
  table: &'static ArchTable,
  variants: &'static [Variant<F>],
  extras: &'static [Tag],
}

impl<F: Copy + 'static> Dispatcher<F> {
  /// Dispatch on base tags only.
  ///
  /// # Panics
  ///
  /// See [`with_extras`](Self::with_extras).
  #[must_use]
  pub const fn base(table: &'static ArchTable, variants: &'static [Variant<F>]) -> Self {
    Self::with_extras(table, variants, &[])
  }

  /// Dispatch on base tags and the listed extras.
  ///
  /// # Panics
  ///
  /// Panics (a compile error when evaluated in a `static` or `const`) if:
  /// - more than [`MAX_EXTRA_TAGS`] extras are listed
  /// - a listed tag is not an extra tag of `table`
  /// - a variant's combination is malformed for `table`
  /// - no Scalar variant without extras exists
  /// - any reachable call site has an ambiguous selection
  #[must_use]
  pub const fn with_extras(
    table: &'static ArchTable,
    variants: &'static [Variant<F>],
    extras: &'static [Tag],
  ) -> Self {
    assert!(extras.len() <= MAX_EXTRA_TAGS, "at most 7 extra tags may be listed");

    let mut rest = extras;
    while let [tag, tail @ ..] = rest {
      assert!(
        tag.is_extra() && tag.index() & table.extra_mask() != 0,
        "only extra tags of the architecture may be listed"
      );
      rest = tail;
    }

    let mut has_fallback = false;
    let mut rest = variants;
    while let [variant, tail @ ..] = rest {
      let tags = variant.tags.assert_well_formed_in(table);
      if tags.bits() == Tags::SCALAR.bits() {
        has_fallback = true;
      }
      rest = tail;
    }
    assert!(has_fallback, "dispatch table needs a Scalar fallback variant");

    let dispatcher = Self { table, variants, extras };
    dispatcher.assert_unambiguous();
    dispatcher
  }

  /// Resolve every base level against every subset of the listed extras.
  const fn assert_unambiguous(&self) {
    let subsets = 1u32 << self.extras.len();

    let mut subset = 0u32;
    while subset < subsets {
      let extras = self.extras_for(subset);

      if let Err(err) = resolve(self.table, self.variants, extras) {
        fail(err);
      }
      let mut rest = self.table.base_tags();
      while let [base, tail @ ..] = rest {
        if let Err(err) = resolve(self.table, self.variants, extras.with(*base)) {
          fail(err);
        }
        rest = tail;
      }

      subset += 1;
    }
  }

  /// Union of the listed extras selected by the bits of `subset`.
  const fn extras_for(&self, subset: u32) -> Tags {
    let mut tags = Tags::SCALAR;
    let mut bit = 0u32;
    let mut rest = self.extras;
    while let [tag, tail @ ..] = rest {
      if subset & (1 << bit) != 0 {
        tags = tags.with(*tag);
      }
      bit += 1;
      rest = tail;
    }
    tags
  }

  #[inline]
  #[must_use]
  pub const fn table(&self) -> &'static ArchTable {
    self.table
  }

  #[inline]
  #[must_use]
  pub const fn variants(&self) -> &'static [Variant<F>] {
    self.variants
  }

  /// Extra tags considered, in call-site accumulation order.
  #[inline]
  #[must_use]
  pub const fn extras(&self) -> &'static [Tag] {
    self.extras
  }

  /// The call site `features` maps to.
  #[must_use]
  pub const fn call_site(&self, features: Features) -> Tags {
    let mut extras = Tags::SCALAR;
    let mut rest = self.extras;
    while let [tag, tail @ ..] = rest {
      if features.has_tag(*tag) {
        extras = extras.with(*tag);
      }
      rest = tail;
    }

    let mut rest = self.table.base_tags();
    while let [lower @ .., base] = rest {
      let candidate = extras.with(*base);
      if features.supports(candidate) {
        return candidate;
      }
      rest = lower;
    }
    extras
  }

  /// The selected variant for `features`.
  #[must_use]
  pub const fn selected(&self, features: Features) -> Selected<F> {
    let variant = select_variant(self.table, self.variants, self.call_site(features));
    Selected::new(variant.tags, variant.func)
  }

  /// The selected implementation for `features`.
  #[inline]
  #[must_use]
  pub const fn select(&self, features: Features) -> F {
    self.selected(features).func
  }

  /// Fallible form of [`selected`](Self::selected).
  ///
  /// # Errors
  ///
  /// See [`resolve`].
  pub const fn try_selected(&self, features: Features) -> Result<Selected<F>, SelectError> {
    match resolve(self.table, self.variants, self.call_site(features)) {
      Ok(variant) => Ok(Selected::new(variant.tags, variant.func)),
      Err(err) => Err(err),
    }
  }

  /// Select for the features the binary was compiled with.
  #[inline]
  #[must_use]
  pub const fn select_compiled(&self) -> F {
    self.select(detect::compiled_features())
  }

  /// Select for the features of the running CPU.
  #[inline]
  #[must_use]
  pub fn select_runtime(&self) -> F {
    self.select(detect::runtime_features())
  }

  /// Select at compile time when the build already targets the table's
  /// highest base tag and every listed extra, and at runtime otherwise.
  ///
  /// Either way the result equals [`select_runtime`](Self::select_runtime):
  /// the runtime features always contain the compiled ones, and a build that
  /// already has the top base and all listed extras leaves the probe nothing
  /// to add to the call site.
  #[inline]
  #[must_use]
  pub fn select_auto(&self) -> F {
    if self.is_final_for(detect::compiled_features()) {
      self.select_compiled()
    } else {
      self.select_runtime()
    }
  }

  /// Whether no superset of `features` can reach a different call site.
  const fn is_final_for(&self, features: Features) -> bool {
    let base: Tag = features.highest_base_in(self.table);
    if base.index() != self.table.highest_base().index() {
      return false;
    }
    let mut rest = self.extras;
    while let [tag, tail @ ..] = rest {
      if !features.has_tag(*tag) {
        return false;
      }
      rest = tail;
    }
    true
  }
}

#[cfg(test)]
mod tests {
  extern crate alloc;

  use platform::{
    tag::{arm, x86},
    tags,
  };

  use super::*;

  type Kernel = fn() -> u32;

  fn scalar() -> u32 {
    0
  }
  fn sse2() -> u32 {
    2
  }
  fn sse41() -> u32 {
    41
  }
  fn sse41_bits() -> u32 {
    4100
  }
  fn avx() -> u32 {
    50
  }
  fn avx2() -> u32 {
    60
  }

  fn x86_features(tags: &[Tag]) -> Features {
    tags
      .iter()
      .fold(Features::NONE, |acc, &tag| acc | tag)
      .normalized_in(&x86::TABLE)
  }

  static CASCADE: Dispatcher<Kernel> = Dispatcher::with_extras(
    &x86::TABLE,
    &[
      Variant::new(Tags::SCALAR, scalar),
      Variant::new(tags![x86::SSE2], sse2),
      Variant::new(tags![x86::SSE41, x86::POPCNT, x86::LZCNT], sse41_bits),
      Variant::new(tags![x86::SSE41], sse41),
    ],
    &[x86::POPCNT, x86::LZCNT],
  );

  static AVX_FAMILY: Dispatcher<Kernel> = Dispatcher::base(
    &x86::TABLE,
    &[
      Variant::new(Tags::SCALAR, scalar),
      Variant::new(tags![x86::AVX], avx),
      Variant::new(tags![x86::AVX2], avx2),
    ],
  );

  #[test]
  fn test_sse42_popcnt_selects_sse41() {
    let cpu = x86_features(&[x86::SSE42, x86::POPCNT]);
    assert_eq!(CASCADE.call_site(cpu), tags![x86::SSE42, x86::POPCNT]);
    assert_eq!((CASCADE.select(cpu))(), 41);
    assert_eq!(CASCADE.selected(cpu).tags, tags![x86::SSE41]);
  }

  #[test]
  fn test_all_extras_select_combined_variant() {
    let cpu = x86_features(&[x86::AVX2, x86::POPCNT, x86::LZCNT]);
    assert_eq!((CASCADE.select(cpu))(), 4100);
  }

  #[test]
  fn test_avx2_selected() {
    let cpu = x86_features(&[x86::AVX2, x86::POPCNT, x86::LZCNT, x86::AVX_FMA]);
    assert_eq!(AVX_FAMILY.call_site(cpu), tags![x86::AVX2]);
    assert_eq!((AVX_FAMILY.select(cpu))(), 60);
  }

  #[test]
  fn test_empty_features_select_scalar() {
    assert_eq!(CASCADE.call_site(Features::NONE), Tags::SCALAR);
    assert_eq!((CASCADE.select(Features::NONE))(), 0);
    assert_eq!((AVX_FAMILY.select(x86_features(&[x86::SSE42])))(), 0);
  }

  #[test]
  fn test_extras_without_base() {
    let cpu = Features::NONE | x86::POPCNT;
    assert_eq!(CASCADE.call_site(cpu), tags![x86::POPCNT]);
    assert_eq!((CASCADE.select(cpu))(), 0);
  }

  #[test]
  fn test_unlisted_extras_ignored() {
    let cpu = x86_features(&[x86::SSE41, x86::LZCNT, x86::AVX_F16C]);
    assert_eq!(CASCADE.call_site(cpu), tags![x86::SSE41, x86::LZCNT]);
    assert_eq!(AVX_FAMILY.call_site(cpu), tags![x86::SSE41]);
  }

  #[test]
  fn test_call_site_checks_only_picked_base() {
    // An unnormalized mask claiming Avx2 alone still reaches Avx2.
    let cpu = Features::from(x86::AVX2);
    assert_eq!(AVX_FAMILY.call_site(cpu), tags![x86::AVX2]);
  }

  #[test]
  fn test_const_select() {
    const SSE: Dispatcher<Kernel> = Dispatcher::base(
      &x86::TABLE,
      &[Variant::new(Tags::SCALAR, scalar), Variant::new(tags![x86::SSE2], sse2)],
    );
    const CPU: Features = Features::NONE.with(x86::SSE2).with(x86::SSE3);
    const CHOSEN: Kernel = SSE.select(CPU);
    assert_eq!(CHOSEN(), 2);
  }

  #[test]
  fn test_try_selected() {
    let cpu = x86_features(&[x86::AVX]);
    assert_eq!(AVX_FAMILY.try_selected(cpu).map(|s| s.tags), Ok(tags![x86::AVX]));
  }

  #[test]
  fn test_arm_dispatch() {
    fn neon() -> u32 {
      1
    }
    fn fp16() -> u32 {
      3
    }
    static NEON: Dispatcher<Kernel> = Dispatcher::base(
      &arm::TABLE,
      &[
        Variant::new(Tags::SCALAR, scalar),
        Variant::new(tags![arm::NEON], neon),
        Variant::new(tags![arm::NEON_FP16], fp16),
      ],
    );

    let a64 = Features::NONE | arm::NEON | arm::NEON_FMA;
    assert_eq!((NEON.select(a64))(), 1);
    assert_eq!((NEON.select(a64 | arm::NEON_FP16))(), 3);
    assert_eq!((NEON.select(Features::NONE))(), 0);

    // Named by the dispatcher's table, not the host's.
    let chosen = NEON.selected(a64 | arm::NEON_FP16);
    assert_eq!(alloc::format!("{}", chosen.tags.display_in(NEON.table())), "NeonFp16");
  }

  #[test]
  fn test_runtime_and_compiled_agree_with_select() {
    assert_eq!(
      CASCADE.select_runtime() as usize,
      CASCADE.select(detect::runtime_features()) as usize
    );
    assert_eq!(
      CASCADE.select_compiled() as usize,
      CASCADE.select(detect::compiled_features()) as usize
    );
    assert_eq!(CASCADE.select_auto() as usize, CASCADE.select_runtime() as usize);
    assert_eq!(AVX_FAMILY.select_auto() as usize, AVX_FAMILY.select_runtime() as usize);
  }

  /// A one-level table: any x86 build reaches its top base, but not its extra.
  const NARROW: ArchTable = ArchTable::new(platform::Arch::X86, &[x86::SSE2], &[x86::POPCNT]);

  fn sse2_popcnt() -> u32 {
    2016
  }

  static NARROW_DISPATCH: Dispatcher<Kernel> = Dispatcher::with_extras(
    &NARROW,
    &[
      Variant::new(Tags::SCALAR, scalar),
      Variant::new(tags![x86::SSE2], sse2),
      Variant::new(tags![x86::SSE2, x86::POPCNT], sse2_popcnt),
    ],
    &[x86::POPCNT],
  );

  #[test]
  fn test_top_base_without_listed_extras_is_not_final() {
    let sse2 = Features::from(x86::SSE2);
    assert!(!NARROW_DISPATCH.is_final_for(sse2));
    assert!(NARROW_DISPATCH.is_final_for(sse2 | x86::POPCNT));
    assert!(!NARROW_DISPATCH.is_final_for(Features::from(x86::POPCNT)));

    // Dispatchers without extras only need the top base.
    assert!(AVX_FAMILY.is_final_for(x86_features(&[x86::AVX512F])));
    assert!(!AVX_FAMILY.is_final_for(x86_features(&[x86::AVX2])));
  }

  #[test]
  fn test_final_compiled_set_agrees_with_any_superset() {
    // A compiled set that is final selects what every richer runtime set selects.
    let compiled = Features::from(x86::SSE2) | x86::POPCNT;
    assert!(NARROW_DISPATCH.is_final_for(compiled));
    let richer = compiled | x86::LZCNT | x86::AVX2;
    assert_eq!(
      NARROW_DISPATCH.select(compiled) as usize,
      NARROW_DISPATCH.select(richer) as usize
    );

    // A compiled set that is not final would pick the lower variant.
    let compiled = Features::from(x86::SSE2);
    assert_ne!(
      NARROW_DISPATCH.select(compiled) as usize,
      NARROW_DISPATCH.select(compiled | x86::POPCNT) as usize
    );
  }

  #[test]
  fn test_select_auto_matches_runtime_with_listed_extras() {
    assert_eq!(
      NARROW_DISPATCH.select_auto() as usize,
      NARROW_DISPATCH.select_runtime() as usize
    );
  }

  #[test]
  #[should_panic(expected = "Scalar fallback")]
  fn test_missing_fallback_rejected() {
    static NO_FALLBACK: [Variant<Kernel>; 1] = [Variant::new(tags![x86::SSE2], sse2)];
    let _ = Dispatcher::base(&x86::TABLE, &NO_FALLBACK);
  }

  #[test]
  #[should_panic(expected = "only extra tags")]
  fn test_base_tag_as_extra_rejected() {
    static ONLY_SCALAR: [Variant<Kernel>; 1] = [Variant::new(Tags::SCALAR, scalar)];
    let _ = Dispatcher::with_extras(&x86::TABLE, &ONLY_SCALAR, &[x86::SSE41]);
  }

  #[test]
  #[should_panic(expected = "ambiguous selection")]
  fn test_reachable_ambiguity_rejected() {
    fn popcnt() -> u32 {
      1
    }
    fn lzcnt() -> u32 {
      2
    }
    static TIED: [Variant<Kernel>; 3] = [
      Variant::new(Tags::SCALAR, scalar),
      Variant::new(tags![x86::SSE41, x86::POPCNT], popcnt),
      Variant::new(tags![x86::SSE41, x86::LZCNT], lzcnt),
    ];
    let _ = Dispatcher::with_extras(&x86::TABLE, &TIED, &[x86::POPCNT, x86::LZCNT]);
  }

  #[test]
  fn test_unreachable_tie_accepted() {
    fn popcnt() -> u32 {
      1
    }
    fn lzcnt() -> u32 {
      2
    }
    // Lzcnt is never part of a call site, so the tie cannot occur.
    static POPCNT_ONLY: Dispatcher<Kernel> = Dispatcher::with_extras(
      &x86::TABLE,
      &[
        Variant::new(Tags::SCALAR, scalar),
        Variant::new(tags![x86::SSE41, x86::POPCNT], popcnt),
        Variant::new(tags![x86::SSE41, x86::LZCNT], lzcnt),
      ],
      &[x86::POPCNT],
    );
    let cpu = x86_features(&[x86::SSE42, x86::POPCNT, x86::LZCNT]);
    assert_eq!((POPCNT_ONLY.select(cpu))(), 1);
  }

  #[test]
  #[should_panic(expected = "at most 7 extra tags")]
  fn test_too_many_extras_rejected() {
    static ONLY_SCALAR: [Variant<Kernel>; 1] = [Variant::new(Tags::SCALAR, scalar)];
    static EIGHT: [Tag; 8] = [x86::POPCNT; 8];
    let _ = Dispatcher::with_extras(&x86::TABLE, &ONLY_SCALAR, &EIGHT);
  }
}

#[cfg(all(test, not(miri)))]
mod proptests {
  use platform::tag::x86;
  use proptest::prelude::*;

  use super::*;

  fn tagged(tags: Tags) -> u32 {
    tags.bits()
  }

  macro_rules! variant {
    ($($tag:expr),*) => {
      Variant::new(platform::tags![$($tag),*], {
        const T: Tags = platform::tags![$($tag),*];
        (|| tagged(T)) as fn() -> u32
      })
    };
  }

  static FULL: Dispatcher<fn() -> u32> = Dispatcher::with_extras(
    &x86::TABLE,
    &[
      variant!(),
      variant!(x86::SSE2),
      variant!(x86::SSE41),
      variant!(x86::SSE41, x86::POPCNT),
      variant!(x86::SSE41, x86::POPCNT, x86::LZCNT),
      variant!(x86::AVX2),
      variant!(x86::AVX2, x86::AVX_FMA),
    ],
    &[x86::POPCNT, x86::LZCNT, x86::AVX_FMA],
  );

  proptest! {
    #[test]
    fn selection_is_admissible_and_supported(bits in any::<u32>()) {
      let features = Features::from_bits(bits).restricted_to(&x86::TABLE).normalized_in(&x86::TABLE);
      let call_site = FULL.call_site(features);
      let selected = FULL.selected(features);

      prop_assert!(features.supports(call_site));
      prop_assert!(crate::priority::is_admissible(selected.tags, call_site));
      prop_assert!(features.supports(selected.tags));
      prop_assert_eq!((selected.func)(), selected.tags.bits());
    }

    #[test]
    fn more_features_never_select_lower(bits in any::<u32>(), extra in any::<u32>()) {
      let table = &x86::TABLE;
      let low = Features::from_bits(bits).restricted_to(table).normalized_in(table);
      let high = (low | Features::from_bits(extra)).restricted_to(table).normalized_in(table);
      let p_low = crate::priority::priority(FULL.selected(low).tags, table);
      let p_high = crate::priority::priority(FULL.selected(high).tags, table);
      prop_assert!(p_high >= p_low);
    }
  }
}
