// ─────────────────────────────────────────────────────────────────────────────
// Compile-Time Static Detection
// ─────────────────────────────────────────────────────────────────────────────

use crate::{
  Features,
  combination::Tags,
  tag::{ArchTable, EXTRA_TAG_MASK, Tag},
};

/// Returns the features known at compile time.
///
/// Detects features enabled via `-C target-feature=...` or `-C target-cpu=...`.
/// Returns a `const` value, so the compiler eliminates every check built on it.
///
/// # Examples
///
/// ```
/// use platform::{Features, detect::compiled_features};
///
/// // Evaluates at compile time, no runtime cost
/// const COMPILED: Features = compiled_features();
///
/// // On x86_64, SSE2 is always present
/// #[cfg(target_arch = "x86_64")]
/// assert!(COMPILED.has_tag(platform::tag::x86::SSE2));
///
/// // On aarch64, NEON (with FMA) is always present
/// #[cfg(target_arch = "aarch64")]
/// assert!(COMPILED.has_tag(platform::tag::arm::NEON_FMA));
/// ```
///
/// # Implementation
///
/// Uses `cfg!()` inside a `const fn`. The result is normalized so every base
/// tag below the highest compiled one is present too.
#[inline(always)]
#[must_use]
pub const fn compiled_features() -> Features {
  #[allow(unused_macros)]
  macro_rules! detect {
    ($features:ident; $($feature:literal => $tag:expr),+ $(,)?) => {
      $(if cfg!(target_feature = $feature) { $features = $features.with($tag); })+
    };
  }

  #[allow(unused_mut)]
  let mut features = Features::NONE;

  #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
  {
    use crate::tag::x86;
    detect!(features;
      "sse2" => x86::SSE2,
      "sse3" => x86::SSE3,
      "ssse3" => x86::SSSE3,
      "sse4.1" => x86::SSE41,
      "sse4.2" => x86::SSE42,
      "avx" => x86::AVX,
      "avx2" => x86::AVX2,
      "avx512f" => x86::AVX512F,
      "popcnt" => x86::POPCNT,
      "lzcnt" => x86::LZCNT,
      "f16c" => x86::AVX_F16C,
      "fma" => x86::AVX_FMA,
    );
  }

  // AArch64 NEON always includes fused multiply-add.
  #[cfg(target_arch = "aarch64")]
  {
    use crate::tag::arm;
    detect!(features;
      "neon" => arm::NEON,
      "neon" => arm::NEON_FMA,
      "fp16" => arm::NEON_FP16,
    );
  }

  #[cfg(target_arch = "arm")]
  {
    use crate::tag::arm;
    detect!(features; "neon" => arm::NEON);
    if cfg!(all(target_feature = "neon", target_feature = "vfp4")) {
      features = features.with(arm::NEON_FMA);
    }
  }

  #[cfg(any(target_arch = "wasm32", target_arch = "wasm64"))]
  {
    use crate::tag::wasm;
    detect!(features; "simd128" => wasm::SIMD128);
  }

  features.normalized_in(ArchTable::native())
}

/// The highest base tag enabled at compile time.
pub const DEFAULT_BASE: Tag = compiled_features().highest_base_in(ArchTable::native());

/// The extra tags enabled at compile time.
pub const DEFAULT_EXTRA: Tags = Tags::from_bits(compiled_features().bits() & EXTRA_TAG_MASK);

/// [`DEFAULT_BASE`] together with [`DEFAULT_EXTRA`]: the combination a
/// compile-time selection would use for this build.
pub const DEFAULT: Tags = Tags::from_tag(DEFAULT_BASE).union(DEFAULT_EXTRA);
