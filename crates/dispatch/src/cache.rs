//! Lazy caching for dispatch results.
//!
//! This module provides [`OnceCache`], a `Copy`-value cache with the same
//! semantics as `std::sync::OnceLock` that also works on no_std targets, and
//! the two cached materializations of a [`Dispatcher`]:
//!
//! - [`DispatchedPointer`]: resolves on first use; test harnesses can replace the pointer (feature
//!   `testing`).
//! - [`DispatchedOnce`]: resolves on first use and never changes afterwards.
//!
//! # Caching Strategy
//!
//! - **std**: Uses `OnceLock` for thread-safe lazy initialization
//! - **no_std with atomics**: Uses an atomic state machine
//! - **no_std without atomics**: Per-call computation (unavoidable for single-threaded embedded)
//!
//! # Example
//!
//! ```
//! use dispatch::{DispatchedPointer, Dispatcher, Variant, variants};
//! use platform::{tag::x86, tags};
//!
//! type Kernel = fn(&[u8]) -> u32;
//!
//! fn scalar(data: &[u8]) -> u32 { data.iter().map(|b| b.count_ones()).sum() }
//! fn popcnt(data: &[u8]) -> u32 { scalar(data) }
//!
//! const VARIANTS: &[Variant<Kernel>] = variants![
//!   tags![] => scalar,
//!   tags![x86::POPCNT] => popcnt,
//! ];
//!
//! static COUNT: DispatchedPointer<Kernel> =
//!   DispatchedPointer::new(Dispatcher::with_extras(&x86::TABLE, VARIANTS, &[x86::POPCNT]));
//!
//! assert_eq!((COUNT.get())(&[0xFF, 0x01]), 9);
//! ```

#[cfg(all(not(feature = "std"), target_has_atomic = "ptr"))]
use core::cell::UnsafeCell;
#[cfg(all(not(feature = "std"), target_has_atomic = "ptr"))]
use core::mem::MaybeUninit;

use platform::detect;

use crate::{Dispatcher, Selected};

// ─────────────────────────────────────────────────────────────────────────────
// OnceCache
// ─────────────────────────────────────────────────────────────────────────────

/// A write-once cache for a `Copy` value.
///
/// This provides lazy initialization with the following properties:
/// - Zero-cost after first initialization (just a load)
/// - Thread-safe on targets with atomics
/// - Falls back to per-call computation on targets without atomics
pub struct OnceCache<T: Copy> {
  #[cfg(feature = "std")]
  inner: std::sync::OnceLock<T>,

  #[cfg(all(not(feature = "std"), target_has_atomic = "ptr"))]
  state: core::sync::atomic::AtomicU8,
  #[cfg(all(not(feature = "std"), target_has_atomic = "ptr"))]
  value: UnsafeCell<MaybeUninit<T>>,

  #[cfg(all(not(feature = "std"), not(target_has_atomic = "ptr")))]
  _marker: core::marker::PhantomData<T>,
}

// SAFETY: `value` is written exactly once, by the thread that moved `state`
// from UNINIT to INITING, and only read after `state` is READY (Release/Acquire).
#[allow(unsafe_code)]
#[cfg(all(not(feature = "std"), target_has_atomic = "ptr"))]
unsafe impl<T: Copy + Send + Sync> Sync for OnceCache<T> {}

impl<T: Copy> OnceCache<T> {
  #[cfg(all(not(feature = "std"), target_has_atomic = "ptr"))]
  const UNINIT: u8 = 0;
  #[cfg(all(not(feature = "std"), target_has_atomic = "ptr"))]
  const INITING: u8 = 1;
  #[cfg(all(not(feature = "std"), target_has_atomic = "ptr"))]
  const READY: u8 = 2;

  /// Create a new empty cache.
  #[must_use]
  pub const fn new() -> Self {
    Self {
      #[cfg(feature = "std")]
      inner: std::sync::OnceLock::new(),

      #[cfg(all(not(feature = "std"), target_has_atomic = "ptr"))]
      state: core::sync::atomic::AtomicU8::new(0),
      #[cfg(all(not(feature = "std"), target_has_atomic = "ptr"))]
      value: UnsafeCell::new(MaybeUninit::uninit()),

      #[cfg(all(not(feature = "std"), not(target_has_atomic = "ptr")))]
      _marker: core::marker::PhantomData,
    }
  }

  /// The cached value, if initialized.
  #[inline]
  #[must_use]
  pub fn get(&self) -> Option<T> {
    #[cfg(feature = "std")]
    {
      self.inner.get().copied()
    }

    #[cfg(all(not(feature = "std"), target_has_atomic = "ptr"))]
    {
      use core::sync::atomic::Ordering;

      if self.state.load(Ordering::Acquire) == Self::READY {
        // SAFETY: Value is initialized when state is READY
        #[allow(unsafe_code)]
        return Some(unsafe { (*self.value.get()).assume_init() });
      }
      None
    }

    #[cfg(all(not(feature = "std"), not(target_has_atomic = "ptr")))]
    {
      None
    }
  }

  /// Get the cached value, initializing with `f` if not yet set.
  ///
  /// On targets with atomics, this is thread-safe and the initializer
  /// is called at most once. On targets without atomics, the initializer
  /// is called on every invocation.
  #[inline]
  pub fn get_or_init(&self, f: impl FnOnce() -> T) -> T {
    #[cfg(feature = "std")]
    {
      *self.inner.get_or_init(f)
    }

    #[cfg(all(not(feature = "std"), target_has_atomic = "ptr"))]
    {
      use core::sync::atomic::Ordering;

      if let Some(value) = self.get() {
        return value;
      }

      if self
        .state
        .compare_exchange(Self::UNINIT, Self::INITING, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
      {
        let value = f();
        // SAFETY: We hold exclusive access during INITING state
        #[allow(unsafe_code)]
        unsafe {
          (*self.value.get()).write(value);
        }
        self.state.store(Self::READY, Ordering::Release);
        return value;
      }

      // Another thread is initializing - spin wait
      while self.state.load(Ordering::Acquire) != Self::READY {
        core::hint::spin_loop();
      }
      // SAFETY: Value is initialized when state is READY
      #[allow(unsafe_code)]
      unsafe {
        (*self.value.get()).assume_init()
      }
    }

    #[cfg(all(not(feature = "std"), not(target_has_atomic = "ptr")))]
    {
      f()
    }
  }
}

impl<T: Copy> Default for OnceCache<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Copy + core::fmt::Debug> core::fmt::Debug for OnceCache<T> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_tuple("OnceCache").field(&self.get()).finish()
  }
}

#[cold]
fn resolve_runtime<F: Copy + 'static>(dispatcher: &Dispatcher<F>) -> Selected<F> {
  let selected = dispatcher.selected(detect::runtime_features());
  log::debug!("dispatch resolved to {}", selected.tags.display_in(dispatcher.table()));
  selected
}

// ─────────────────────────────────────────────────────────────────────────────
// DispatchedPointer
// ─────────────────────────────────────────────────────────────────────────────

/// A process-wide function pointer resolved against the running CPU.
///
/// The first [`get`](Self::get) selects with
/// [`runtime_features()`](platform::runtime_features) and caches the result.
///
/// With the `testing` feature, [`set`](Self::set) replaces the pointer and
/// [`reset`](Self::reset) goes back to the resolved one. Replacement is meant
/// to happen while no other thread calls through the pointer; concurrent
/// writers stay memory safe but the pointer they observe is unspecified.
pub struct DispatchedPointer<F: Copy + 'static> {
  dispatcher: Dispatcher<F>,
  resolved: OnceCache<Selected<F>>,
  #[cfg(all(feature = "std", any(test, feature = "testing")))]
  replacement: std::sync::RwLock<Option<F>>,
}

impl<F: Copy + 'static> DispatchedPointer<F> {
  #[must_use]
  pub const fn new(dispatcher: Dispatcher<F>) -> Self {
    Self {
      dispatcher,
      resolved: OnceCache::new(),
      #[cfg(all(feature = "std", any(test, feature = "testing")))]
      replacement: std::sync::RwLock::new(None),
    }
  }

  /// The current function pointer.
  #[inline]
  #[must_use]
  pub fn get(&self) -> F {
    #[cfg(all(feature = "std", any(test, feature = "testing")))]
    {
      if let Some(func) = self.replacement() {
        return func;
      }
    }
    self.selected().func
  }

  /// The variant chosen for the running CPU, ignoring any replacement.
  #[inline]
  #[must_use]
  pub fn selected(&self) -> Selected<F> {
    self.resolved.get_or_init(|| resolve_runtime(&self.dispatcher))
  }

  #[inline]
  #[must_use]
  pub const fn dispatcher(&self) -> &Dispatcher<F> {
    &self.dispatcher
  }

  #[cfg(all(feature = "std", any(test, feature = "testing")))]
  fn replacement(&self) -> Option<F> {
    *self.replacement.read().unwrap_or_else(std::sync::PoisonError::into_inner)
  }

  /// Replace the function pointer.
  ///
  /// # Errors
  ///
  /// [`OverrideError::Unsupported`](platform::OverrideError::Unsupported)
  /// without `std`.
  #[cfg(any(test, feature = "testing"))]
  pub fn try_set(&self, func: F) -> Result<(), platform::OverrideError> {
    #[cfg(feature = "std")]
    {
      *self.replacement.write().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(func);
      Ok(())
    }

    #[cfg(not(feature = "std"))]
    {
      let _ = func;
      Err(platform::OverrideError::Unsupported)
    }
  }

  /// Replace the function pointer.
  ///
  /// # Panics
  ///
  /// Panics if the pointer cannot be replaced (no `std`).
  #[cfg(any(test, feature = "testing"))]
  pub fn set(&self, func: F) {
    if let Err(err) = self.try_set(func) {
      panic!("DispatchedPointer::set failed: {err}");
    }
  }

  /// Drop any replacement and go back to the resolved variant.
  #[cfg(any(test, feature = "testing"))]
  pub fn reset(&self) {
    #[cfg(feature = "std")]
    {
      *self.replacement.write().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
  }

  /// Whether a replacement is installed.
  #[cfg(any(test, feature = "testing"))]
  #[must_use]
  pub fn is_replaced(&self) -> bool {
    #[cfg(feature = "std")]
    {
      self.replacement().is_some()
    }

    #[cfg(not(feature = "std"))]
    {
      false
    }
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// DispatchedOnce
// ─────────────────────────────────────────────────────────────────────────────

/// A function pointer resolved once per process and immutable afterwards.
///
/// The closest stable-Rust equivalent of loader-resolved (IFUNC) symbols:
/// the first call selects, every later call jumps straight to the choice.
/// See [`dispatched_fn!`](crate::dispatched_fn) for the function-shaped form.
pub struct DispatchedOnce<F: Copy + 'static> {
  dispatcher: Dispatcher<F>,
  resolved: OnceCache<Selected<F>>,
}

impl<F: Copy + 'static> DispatchedOnce<F> {
  #[must_use]
  pub const fn new(dispatcher: Dispatcher<F>) -> Self {
    Self {
      dispatcher,
      resolved: OnceCache::new(),
    }
  }

  /// The resolved function pointer.
  #[inline]
  #[must_use]
  pub fn get(&self) -> F {
    self.selected().func
  }

  /// The resolved variant.
  #[inline]
  #[must_use]
  pub fn selected(&self) -> Selected<F> {
    self.resolved.get_or_init(|| resolve_runtime(&self.dispatcher))
  }

  /// Whether the first call has happened.
  #[inline]
  #[must_use]
  pub fn is_resolved(&self) -> bool {
    self.resolved.get().is_some()
  }

  #[inline]
  #[must_use]
  pub const fn dispatcher(&self) -> &Dispatcher<F> {
    &self.dispatcher
  }
}
