//! x86/x86_64 CPUID decoding.
//!
//! [`probe`] reads the raw registers once, [`decode`] turns them into a
//! [`Features`] value. Decoding is pure so it can be tested on any host with
//! hand-built snapshots.

use crate::{
  Features,
  tag::{self, x86},
};

// Leaf 1 EDX
const EDX_SSE2: u32 = 1 << 26;
// Leaf 1 ECX
const ECX_SSE3: u32 = 1 << 0;
const ECX_SSSE3: u32 = 1 << 9;
const ECX_FMA: u32 = 1 << 12;
const ECX_SSE41: u32 = 1 << 19;
const ECX_SSE42: u32 = 1 << 20;
const ECX_POPCNT: u32 = 1 << 23;
const ECX_OSXSAVE: u32 = 1 << 27;
const ECX_AVX: u32 = 1 << 28;
const ECX_F16C: u32 = 1 << 29;
// Leaf 7 subleaf 0 EBX
const EBX7_AVX2: u32 = 1 << 5;
const EBX7_AVX512F: u32 = 1 << 16;
// Leaf 0x8000_0001 ECX
const ECX_EXT_LZCNT: u32 = 1 << 5;

/// XCR0 bits 1-2: XMM + YMM state. Required before any AVX instruction.
pub const XCR0_AVX_MASK: u64 = 0x6;
/// XCR0 bits 5-7: opmask + ZMM_Hi256 + Hi16_ZMM state. Required for AVX-512.
pub const XCR0_AVX512_MASK: u64 = 0xE0;

/// Raw CPUID/XGETBV registers relevant to the x86 tag table.
///
/// Registers of leaves the CPU does not implement are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuidSnapshot {
  /// Leaf 1 ECX.
  pub leaf1_ecx: u32,
  /// Leaf 1 EDX.
  pub leaf1_edx: u32,
  /// Leaf 7 subleaf 0 EBX.
  pub leaf7_ebx: u32,
  /// Leaf 0x8000_0001 ECX.
  pub ext1_ecx: u32,
  /// XCR0 as read by `XGETBV(0)`. Zero when OSXSAVE is clear.
  pub xcr0: u64,
}

/// Decode a CPUID snapshot into features.
///
/// CPUID reports what the CPU supports, not what the OS allows: AVX and
/// everything VEX/EVEX encoded (Avx, Avx2, Avx512f, AvxFma, AvxF16c) is only
/// reported when OSXSAVE is set and XCR0 confirms the OS saves YMM state.
/// AVX-512 additionally needs the ZMM state bits.
#[must_use]
pub const fn decode(cpuid: CpuidSnapshot) -> Features {
  let ecx = cpuid.leaf1_ecx;
  let mut features = Features::NONE;

  // ─── SSE family and POPCNT (no OS gating) ───
  if cpuid.leaf1_edx & EDX_SSE2 != 0 {
    features = features.with(x86::SSE2);
  }
  if ecx & ECX_SSE3 != 0 {
    features = features.with(x86::SSE3);
  }
  if ecx & ECX_SSSE3 != 0 {
    features = features.with(x86::SSSE3);
  }
  if ecx & ECX_SSE41 != 0 {
    features = features.with(x86::SSE41);
  }
  if ecx & ECX_SSE42 != 0 {
    features = features.with(x86::SSE42);
  }
  if ecx & ECX_POPCNT != 0 {
    features = features.with(x86::POPCNT);
  }
  if cpuid.ext1_ecx & ECX_EXT_LZCNT != 0 {
    features = features.with(x86::LZCNT);
  }

  // ─── AVX family (OS gated) ───
  let os_avx = ecx & ECX_OSXSAVE != 0 && cpuid.xcr0 & XCR0_AVX_MASK == XCR0_AVX_MASK;
  if os_avx {
    if ecx & ECX_AVX != 0 {
      features = features.with(x86::AVX);
    }
    if ecx & ECX_FMA != 0 {
      features = features.with(x86::AVX_FMA);
    }
    if ecx & ECX_F16C != 0 {
      features = features.with(x86::AVX_F16C);
    }
    if cpuid.leaf7_ebx & EBX7_AVX2 != 0 {
      features = features.with(x86::AVX2);
    }
    if cpuid.leaf7_ebx & EBX7_AVX512F != 0 && cpuid.xcr0 & XCR0_AVX512_MASK == XCR0_AVX512_MASK {
      features = features.with(x86::AVX512F);
    }
  }

  features.normalized_in(&tag::x86::TABLE)
}

/// Read the registers [`decode`] needs from the running CPU.
///
/// Makes at most five CPUID calls plus one XGETBV:
/// - Leaf 0: highest basic leaf
/// - Leaf 1: SSE family, POPCNT, FMA, F16C, OSXSAVE, AVX
/// - Leaf 7.0: AVX2, AVX-512F (if implemented)
/// - Leaf 0x8000_0000 / 0x8000_0001: LZCNT (if implemented)
#[cfg(all(feature = "std", not(miri), any(target_arch = "x86_64", target_arch = "x86")))]
#[allow(unsafe_code, unused_unsafe)]
#[must_use]
pub fn probe() -> CpuidSnapshot {
  #[cfg(target_arch = "x86")]
  use core::arch::x86::{__cpuid, __cpuid_count, _xgetbv, has_cpuid};
  #[cfg(target_arch = "x86_64")]
  use core::arch::x86_64::{__cpuid, __cpuid_count, _xgetbv};

  #[cfg(target_arch = "x86")]
  if !has_cpuid() {
    return CpuidSnapshot::default();
  }

  // SAFETY: CPUID exists on every x86_64 CPU and was checked above on x86.
  let leaf0 = unsafe { __cpuid(0) };
  // SAFETY: as above; leaf 1 is always implemented.
  let leaf1 = unsafe { __cpuid(1) };

  let leaf7_ebx = if leaf0.eax >= 7 {
    // SAFETY: as above; leaf 7 is implemented per leaf 0.
    unsafe { __cpuid_count(7, 0) }.ebx
  } else {
    0
  };

  // SAFETY: as above; the extended range query is always valid.
  let ext0 = unsafe { __cpuid(0x8000_0000) };
  let ext1_ecx = if ext0.eax >= 0x8000_0001 {
    // SAFETY: as above; the extended leaf is implemented per 0x8000_0000.
    unsafe { __cpuid(0x8000_0001) }.ecx
  } else {
    0
  };

  let xcr0 = if leaf1.ecx & ECX_OSXSAVE != 0 {
    // SAFETY: XGETBV is available when OSXSAVE is set (checked above).
    unsafe { _xgetbv(0) }
  } else {
    0
  };

  CpuidSnapshot {
    leaf1_ecx: leaf1.ecx,
    leaf1_edx: leaf1.edx,
    leaf7_ebx,
    ext1_ecx,
    xcr0,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tag::x86;

  /// A Haswell-class CPU: SSE2..AVX2, POPCNT, LZCNT, FMA, F16C, no AVX-512.
  const HASWELL: CpuidSnapshot = CpuidSnapshot {
    leaf1_ecx: ECX_SSE3
      | ECX_SSSE3
      | ECX_FMA
      | ECX_SSE41
      | ECX_SSE42
      | ECX_POPCNT
      | ECX_OSXSAVE
      | ECX_AVX
      | ECX_F16C,
    leaf1_edx: EDX_SSE2,
    leaf7_ebx: EBX7_AVX2,
    ext1_ecx: ECX_EXT_LZCNT,
    xcr0: 0x7,
  };

  #[test]
  fn test_empty_snapshot_is_fallback() {
    assert_eq!(decode(CpuidSnapshot::default()), Features::NONE);
  }

  #[test]
  fn test_haswell() {
    let f = decode(HASWELL);
    let expected = Features::NONE
      | x86::SSE2
      | x86::SSE3
      | x86::SSSE3
      | x86::SSE41
      | x86::SSE42
      | x86::AVX
      | x86::AVX2
      | x86::POPCNT
      | x86::LZCNT
      | x86::AVX_FMA
      | x86::AVX_F16C;
    assert_eq!(f, expected);
  }

  #[test]
  fn test_avx_requires_osxsave() {
    let cpuid = CpuidSnapshot {
      leaf1_ecx: HASWELL.leaf1_ecx & !ECX_OSXSAVE,
      ..HASWELL
    };
    let f = decode(cpuid);
    assert!(f.has_tag(x86::SSE42));
    assert!(f.has_tag(x86::POPCNT));
    for tag in [x86::AVX, x86::AVX2, x86::AVX512F, x86::AVX_FMA, x86::AVX_F16C] {
      assert!(!f.has_tag(tag), "{tag} must be gated on OSXSAVE");
    }
  }

  #[test]
  fn test_avx_requires_ymm_state() {
    // XMM state only: the OS does not save YMM registers.
    let cpuid = CpuidSnapshot { xcr0: 0x2, ..HASWELL };
    let f = decode(cpuid);
    assert_eq!(f.highest_base_in(&x86::TABLE), x86::SSE42);
    assert!(!f.has_tag(x86::AVX_FMA));
  }

  #[test]
  fn test_avx512_requires_zmm_state() {
    let skylake_x = CpuidSnapshot {
      leaf7_ebx: EBX7_AVX2 | EBX7_AVX512F,
      ..HASWELL
    };
    assert!(!decode(skylake_x).has_tag(x86::AVX512F));

    let with_zmm = CpuidSnapshot { xcr0: 0xE7, ..skylake_x };
    assert!(decode(with_zmm).has_tag(x86::AVX512F));
  }

  #[test]
  fn test_lzcnt_from_extended_leaf() {
    let cpuid = CpuidSnapshot {
      leaf1_edx: EDX_SSE2,
      ext1_ecx: ECX_EXT_LZCNT,
      ..CpuidSnapshot::default()
    };
    assert_eq!(decode(cpuid), Features::NONE | x86::SSE2 | x86::LZCNT);
  }

  #[test]
  fn test_hierarchy_is_monotonic() {
    // SSE4.1 reported without SSSE3: lower levels are filled in.
    let cpuid = CpuidSnapshot {
      leaf1_ecx: ECX_SSE41,
      ..CpuidSnapshot::default()
    };
    assert_eq!(decode(cpuid), Features::NONE | x86::SSE2 | x86::SSE3 | x86::SSSE3 | x86::SSE41);
  }

  #[test]
  #[cfg(all(feature = "std", not(miri), any(target_arch = "x86_64", target_arch = "x86")))]
  fn test_probe_agrees_with_std_detection() {
    let f = decode(probe());
    assert_eq!(f.has_tag(x86::SSE42), std::is_x86_feature_detected!("sse4.2"));
    assert_eq!(f.has_tag(x86::AVX2), std::is_x86_feature_detected!("avx2"));
    assert_eq!(f.has_tag(x86::POPCNT), std::is_x86_feature_detected!("popcnt"));
    assert_eq!(f.has_tag(x86::LZCNT), std::is_x86_feature_detected!("lzcnt"));
  }
}
