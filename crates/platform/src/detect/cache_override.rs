// ─────────────────────────────────────────────────────────────────────────────
// Cache and Override System
// ─────────────────────────────────────────────────────────────────────────────
//
// Two use cases:
// 1. Normal detection with caching (std: OnceLock, no_std: atomics)
// 2. User-supplied overrides for bare metal and testing
//
// The override takes precedence over detection and is only accepted before
// detection starts. Detection seals the slot under its lock, so a writer racing
// the first `runtime_features()` either lands before the seal or gets
// `AlreadyInitialized`.

#[cfg(feature = "std")]
use std::sync::{OnceLock, RwLock};

use crate::{Features, error::OverrideError};

#[cfg(feature = "std")]
static STD_CACHE: OnceLock<Features> = OnceLock::new();

#[cfg(feature = "std")]
static OVERRIDE: RwLock<OverrideSlot> = RwLock::new(OverrideSlot::new());

/// The override value plus whether detection has already consumed it.
#[cfg(any(feature = "std", test))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct OverrideSlot {
  value: Option<Features>,
  sealed: bool,
}

#[cfg(any(feature = "std", test))]
impl OverrideSlot {
  pub(crate) const fn new() -> Self {
    Self {
      value: None,
      sealed: false,
    }
  }

  pub(crate) fn set(&mut self, value: Option<Features>) -> Result<(), OverrideError> {
    if self.sealed {
      return Err(OverrideError::AlreadyInitialized);
    }
    self.value = value;
    Ok(())
  }

  /// Freeze the slot and hand out the value detection should use.
  pub(crate) fn seal(&mut self) -> Option<Features> {
    self.sealed = true;
    self.value
  }

  pub(crate) const fn value(&self) -> Option<Features> {
    self.value
  }
}

/// Return the cached value, computing it with `init` on first use.
#[inline]
pub(crate) fn get_or_init(init: fn() -> Features) -> Features {
  #[cfg(feature = "std")]
  {
    *STD_CACHE.get_or_init(init)
  }

  #[cfg(all(not(feature = "std"), target_has_atomic = "32"))]
  {
    atomic_cache::get_or_init(init)
  }

  #[cfg(all(not(feature = "std"), not(target_has_atomic = "32")))]
  {
    init()
  }
}

/// Set the detection override.
///
/// Must be called **before** the first call to
/// [`runtime_features()`](crate::runtime_features). Pass `None` to remove a
/// previously set override.
///
/// # Panics
///
/// Panics if detection has already been cached or the target cannot store overrides.
#[cold]
pub fn set_override(value: Option<Features>) {
  if let Err(err) = try_set_override(value) {
    panic!("platform::set_override failed: {err}");
  }
}

/// Try to set the detection override.
///
/// Contract: pre-init only. Once [`runtime_features()`](crate::runtime_features)
/// has cached its result, this returns [`OverrideError::AlreadyInitialized`].
///
/// # Errors
///
/// [`OverrideError::AlreadyInitialized`] after detection ran,
/// [`OverrideError::Unsupported`] if the override cannot be stored.
#[cold]
pub fn try_set_override(value: Option<Features>) -> Result<(), OverrideError> {
  #[cfg(feature = "std")]
  {
    if STD_CACHE.get().is_some() {
      return Err(OverrideError::AlreadyInitialized);
    }

    match OVERRIDE.write() {
      Ok(mut slot) => slot.set(value),
      Err(_) => Err(OverrideError::Unsupported),
    }
  }

  #[cfg(all(not(feature = "std"), target_has_atomic = "32"))]
  {
    atomic_cache::try_set_override(value)
  }

  #[cfg(all(not(feature = "std"), not(target_has_atomic = "32")))]
  {
    let _ = value;
    Err(OverrideError::Unsupported)
  }
}

/// Remove the detection override.
///
/// # Panics
///
/// Same conditions as [`set_override`].
#[cold]
pub fn clear_override() {
  set_override(None);
}

/// Check if an override is set.
#[inline]
#[must_use]
pub fn has_override() -> bool {
  current_override().is_some()
}

/// The override, if one is set.
pub(crate) fn current_override() -> Option<Features> {
  #[cfg(feature = "std")]
  {
    OVERRIDE.read().ok().and_then(|slot| slot.value())
  }

  #[cfg(all(not(feature = "std"), target_has_atomic = "32"))]
  {
    atomic_cache::get_override()
  }

  #[cfg(all(not(feature = "std"), not(target_has_atomic = "32")))]
  {
    None
  }
}

/// The override detection should apply. Later overrides are rejected.
pub(crate) fn seal_override() -> Option<Features> {
  #[cfg(feature = "std")]
  {
    OVERRIDE
      .write()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
      .seal()
  }

  #[cfg(all(not(feature = "std"), target_has_atomic = "32"))]
  {
    atomic_cache::get_override()
  }

  #[cfg(all(not(feature = "std"), not(target_has_atomic = "32")))]
  {
    None
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Atomic Cache (no_std with 32-bit atomics)
// ─────────────────────────────────────────────────────────────────────────────
//
// `Features` is a single `u32`, so the cached value and the override fit in
// plain atomics and no unsafe cell is needed.

#[cfg(all(not(feature = "std"), target_has_atomic = "32"))]
mod atomic_cache {
  use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

  use super::*;

  const STATE_UNINIT: u8 = 0;
  const STATE_INITING: u8 = 1;
  const STATE_READY: u8 = 2;
  /// An override write is in progress; detection waits for it.
  const STATE_WRITING: u8 = 3;

  static STATE: AtomicU8 = AtomicU8::new(STATE_UNINIT);
  static CACHED: AtomicU32 = AtomicU32::new(0);

  static OVERRIDE_SET: AtomicBool = AtomicBool::new(false);
  static OVERRIDE_VALUE: AtomicU32 = AtomicU32::new(0);

  pub fn get_or_init(f: fn() -> Features) -> Features {
    if STATE.load(Ordering::Acquire) == STATE_READY {
      return load_cached();
    }

    loop {
      match STATE.compare_exchange(STATE_UNINIT, STATE_INITING, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {
          let result = f();
          CACHED.store(result.bits(), Ordering::Release);
          STATE.store(STATE_READY, Ordering::Release);
          return result;
        }
        Err(STATE_INITING) => {
          while STATE.load(Ordering::Acquire) == STATE_INITING {
            core::hint::spin_loop();
          }
          return load_cached();
        }
        Err(STATE_WRITING) => {
          while STATE.load(Ordering::Acquire) == STATE_WRITING {
            core::hint::spin_loop();
          }
        }
        Err(_) => return load_cached(),
      }
    }
  }

  fn load_cached() -> Features {
    Features::from_bits(CACHED.load(Ordering::Acquire))
  }

  pub fn try_set_override(value: Option<Features>) -> Result<(), OverrideError> {
    // Claim the slot so detection cannot start between the check and the store.
    loop {
      match STATE.compare_exchange(STATE_UNINIT, STATE_WRITING, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => break,
        Err(STATE_WRITING) => core::hint::spin_loop(),
        Err(_) => return Err(OverrideError::AlreadyInitialized),
      }
    }

    if let Some(features) = value {
      OVERRIDE_VALUE.store(features.bits(), Ordering::Release);
    }
    OVERRIDE_SET.store(value.is_some(), Ordering::Release);
    STATE.store(STATE_UNINIT, Ordering::Release);
    Ok(())
  }

  pub fn get_override() -> Option<Features> {
    if !OVERRIDE_SET.load(Ordering::Acquire) {
      return None;
    }
    Some(Features::from_bits(OVERRIDE_VALUE.load(Ordering::Acquire)))
  }
}
