//! ARM/AArch64 HWCAP decoding.
//!
//! On Linux and Android the kernel publishes CPU features in the ELF auxiliary
//! vector (`AT_HWCAP`). [`hwcap_from_auxv`] extracts it from the raw vector and
//! [`decode_hwcap`] maps it onto the ARM tag table. Other AArch64 systems fall
//! back to `std::arch::is_aarch64_feature_detected!`.

use crate::{
  Features,
  tag::{self, arm},
};

/// `AT_HWCAP` auxiliary vector key.
pub const AT_HWCAP: u64 = 16;

/// AArch64: Advanced SIMD half-precision arithmetic.
pub const HWCAP_ASIMDHP: u64 = 1 << 10;
/// 32-bit ARM: NEON.
pub const HWCAP_NEON: u64 = 1 << 12;
/// 32-bit ARM: VFPv4, which brings fused multiply-add to NEON.
pub const HWCAP_VFPV4: u64 = 1 << 16;

/// Which HWCAP bit assignment a value uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwcapLayout {
  Aarch64,
  Arm32,
}

impl HwcapLayout {
  /// Layout of the compilation target, if it is an ARM target.
  #[must_use]
  pub const fn native() -> Option<Self> {
    if cfg!(target_arch = "aarch64") {
      Some(Self::Aarch64)
    } else if cfg!(target_arch = "arm") {
      Some(Self::Arm32)
    } else {
      None
    }
  }
}

/// Decode an `AT_HWCAP` value into features.
///
/// AArch64 always has NEON with FMA; half-precision arithmetic comes from
/// `HWCAP_ASIMDHP`. On 32-bit ARM, NEON comes from `HWCAP_NEON` and FMA needs
/// `HWCAP_VFPV4` on top of it.
#[must_use]
pub const fn decode_hwcap(hwcap: u64, layout: HwcapLayout) -> Features {
  let mut features = Features::NONE;
  match layout {
    HwcapLayout::Aarch64 => {
      features = features.with(arm::NEON).with(arm::NEON_FMA);
      if hwcap & HWCAP_ASIMDHP != 0 {
        features = features.with(arm::NEON_FP16);
      }
    }
    HwcapLayout::Arm32 => {
      if hwcap & HWCAP_NEON != 0 {
        features = features.with(arm::NEON);
        if hwcap & HWCAP_VFPV4 != 0 {
          features = features.with(arm::NEON_FMA);
        }
      }
    }
  }
  features.normalized_in(&tag::arm::TABLE)
}

/// Find `AT_HWCAP` in a raw auxiliary vector.
///
/// The vector is a sequence of native-endian `(key, value)` word pairs, each
/// word `usize` wide, terminated by an `AT_NULL` key.
#[must_use]
pub fn hwcap_from_auxv(auxv: &[u8]) -> Option<u64> {
  const WORD: usize = core::mem::size_of::<usize>();

  let read_word = |bytes: &[u8]| -> Option<u64> {
    let word: [u8; WORD] = bytes.try_into().ok()?;
    u64::try_from(usize::from_ne_bytes(word)).ok()
  };

  for entry in auxv.chunks_exact(2 * WORD) {
    let key = read_word(entry.get(..WORD)?)?;
    if key == 0 {
      break;
    }
    if key == AT_HWCAP {
      return read_word(entry.get(WORD..)?);
    }
  }
  None
}

/// Probe the running CPU.
#[cfg(all(
  feature = "std",
  not(miri),
  any(target_arch = "aarch64", target_arch = "arm"),
  any(target_os = "linux", target_os = "android")
))]
#[must_use]
pub fn probe() -> Features {
  let Some(layout) = HwcapLayout::native() else {
    return Features::NONE;
  };

  match std::fs::read("/proc/self/auxv").ok().as_deref().and_then(hwcap_from_auxv) {
    Some(hwcap) => decode_hwcap(hwcap, layout),
    None => {
      log::debug!("AT_HWCAP unavailable, keeping compile-time ARM features");
      Features::NONE
    }
  }
}

/// Probe the running CPU.
#[cfg(all(
  feature = "std",
  not(miri),
  target_arch = "aarch64",
  not(any(target_os = "linux", target_os = "android"))
))]
#[must_use]
pub fn probe() -> Features {
  let hwcap = if std::arch::is_aarch64_feature_detected!("fp16") {
    HWCAP_ASIMDHP
  } else {
    0
  };
  decode_hwcap(hwcap, HwcapLayout::Aarch64)
}
