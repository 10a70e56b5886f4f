//! Declaration macros.

/// Declare a variant table: `tags => function` pairs.
///
/// Expands to `&[Variant::new(tags, function), ...]`. Give the binding a
/// type so plain functions and closures coerce to one pointer type:
///
/// ```
/// use dispatch::{Variant, variants};
/// use platform::{tag::arm, tags};
///
/// const VARIANTS: &[Variant<fn(f32) -> f32>] = variants![
///   tags![] => |x| x * 2.0,
///   tags![arm::NEON] => |x| x + x,
/// ];
/// assert_eq!(VARIANTS.len(), 2);
/// ```
#[macro_export]
macro_rules! variants {
  ($($tags:expr => $func:expr),* $(,)?) => {
    &[$($crate::Variant::new($tags, $func)),*]
  };
}

/// Select a variant at compile time.
///
/// `select!(table, variants, call_site)` evaluates the selection in an inline
/// `const` block and yields the chosen function. An ambiguous table or a
/// missing fallback is a build error:
///
/// ```compile_fail
/// use dispatch::{Variant, select, variants};
/// use platform::{tag::x86, tags};
///
/// const VARIANTS: &[Variant<fn() -> u32>] = variants![
///   tags![] => || 0,
///   tags![x86::SSE41, x86::POPCNT] => || 1,
///   tags![x86::SSE41, x86::LZCNT] => || 2,
/// ];
///
/// // Both variants are admissible with equal priority.
/// let f = select!(&x86::TABLE, VARIANTS, tags![x86::SSE41, x86::POPCNT, x86::LZCNT]);
/// ```
#[macro_export]
macro_rules! select {
  ($table:expr, $variants:expr, $call_site:expr $(,)?) => {
    const { $crate::select::select_variant($table, $variants, $call_site).func }
  };
}

/// Define a function that forwards to a [`DispatchedOnce`](crate::DispatchedOnce).
///
/// The first call resolves the dispatcher against the running CPU; every call
/// then goes straight to the chosen variant.
///
/// ```
/// use dispatch::{Dispatcher, Variant, dispatched_fn, variants};
/// use platform::{tag::x86, tags};
///
/// type Sum = fn(&[u32]) -> u32;
///
/// const SUM: Dispatcher<Sum> = Dispatcher::base(&x86::TABLE, variants![
///   tags![] => |xs| xs.iter().sum(),
///   tags![x86::SSE2] => |xs| xs.iter().copied().fold(0, u32::wrapping_add),
/// ]);
///
/// dispatched_fn! {
///   /// Sum of `xs`.
///   pub fn sum(xs: &[u32]) -> u32 = SUM;
/// }
///
/// assert_eq!(sum(&[1, 2, 3]), 6);
/// ```
#[macro_export]
macro_rules! dispatched_fn {
  ($(
    $(#[$meta:meta])*
    $vis:vis fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)? = $dispatcher:expr;
  )+) => {$(
    $(#[$meta])*
    #[inline]
    $vis fn $name($($arg: $ty),*) $(-> $ret)? {
      static RESOLVED: $crate::DispatchedOnce<fn($($ty),*) $(-> $ret)?> =
        $crate::DispatchedOnce::new($dispatcher);
      (RESOLVED.get())($($arg),*)
    }
  )+};
}
