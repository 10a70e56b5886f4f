//! End-to-end selection scenarios.
//!
//! Each scenario declares a variant table, feeds a feature set through a
//! dispatcher, and checks which variant comes out. All three materialization
//! strategies must agree with the direct call.

use isatag::{
  DispatchedOnce, DispatchedPointer, Dispatcher, Features, SelectError, Tag, Tags, Variant, dispatched_fn, resolve,
  runtime_features, select, tags, variants, x86,
};

type Kernel = fn() -> &'static str;

fn x86_cpu(tags: &[Tag]) -> Features {
  tags
    .iter()
    .fold(Features::NONE, |acc, &tag| acc | tag)
    .normalized_in(&x86::TABLE)
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario: SSE cascade with a combined-extras variant
// ─────────────────────────────────────────────────────────────────────────────

const SSE_VARIANTS: &[Variant<Kernel>] = variants![
  tags![] => || "scalar",
  tags![x86::SSE2] => || "sse2",
  tags![x86::SSE41, x86::POPCNT, x86::LZCNT] => || "sse41+popcnt+lzcnt",
  tags![x86::SSE41] => || "sse41",
];

const SSE: Dispatcher<Kernel> = Dispatcher::with_extras(&x86::TABLE, SSE_VARIANTS, &[x86::POPCNT, x86::LZCNT]);

#[test]
fn sse42_popcnt_selects_sse41() {
  let cpu = x86_cpu(&[x86::SSE42, x86::POPCNT]);
  assert_eq!(cpu, Features::NONE | x86::SSE2 | x86::SSE3 | x86::SSSE3 | x86::SSE41 | x86::SSE42 | x86::POPCNT);
  assert_eq!((SSE.select(cpu))(), "sse41");
}

#[test]
fn sse41_with_both_extras_selects_combined() {
  let cpu = x86_cpu(&[x86::SSE41, x86::POPCNT, x86::LZCNT]);
  assert_eq!((SSE.select(cpu))(), "sse41+popcnt+lzcnt");
}

#[test]
fn sse2_only_selects_sse2() {
  assert_eq!((SSE.select(x86_cpu(&[x86::SSSE3])))(), "sse2");
  assert_eq!((SSE.select(Features::NONE))(), "scalar");
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario: AVX family, base-only dispatch
// ─────────────────────────────────────────────────────────────────────────────

const AVX: Dispatcher<Kernel> = Dispatcher::base(
  &x86::TABLE,
  variants![
    tags![] => || "scalar",
    tags![x86::AVX] => || "avx",
    tags![x86::AVX2] => || "avx2",
  ],
);

#[test]
fn avx2_cpu_selects_avx2() {
  let cpu = x86_cpu(&[x86::AVX2, x86::POPCNT, x86::LZCNT, x86::AVX_FMA]);
  assert_eq!((AVX.select(cpu))(), "avx2");
  assert_eq!(AVX.selected(cpu).tags, tags![x86::AVX2]);
}

#[test]
fn avx512_cpu_still_selects_avx2() {
  assert_eq!((AVX.select(x86_cpu(&[x86::AVX512F])))(), "avx2");
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario: ambiguity
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn equal_priority_pair_is_ambiguous_at_runtime() {
  let variants: &[Variant<Kernel>] = variants![
    tags![] => || "scalar",
    tags![x86::SSE41, x86::POPCNT] => || "popcnt",
    tags![x86::SSE41, x86::LZCNT] => || "lzcnt",
  ];

  let both = tags![x86::SSE41, x86::POPCNT, x86::LZCNT];
  assert!(matches!(
    resolve(&x86::TABLE, variants, both),
    Err(SelectError::Ambiguous { .. })
  ));

  // Each alone is fine.
  let popcnt = tags![x86::SSE42, x86::POPCNT];
  assert_eq!((resolve(&x86::TABLE, variants, popcnt).unwrap().func)(), "popcnt");
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario: compile-time selection
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn const_selection_matches_dispatcher() {
  let f = select!(&x86::TABLE, SSE_VARIANTS, tags![x86::AVX, x86::POPCNT]);
  assert_eq!(f(), "sse41");

  const CPU: Features = Features::NONE.with(x86::SSE2).with(x86::SSE3);
  const CHOSEN: Kernel = SSE.select(CPU);
  assert_eq!(CHOSEN(), "sse2");
}

#[test]
fn tags_round_trip_through_features() {
  let combined: Tags = tags![x86::AVX2, x86::POPCNT, x86::LZCNT];
  let unioned = Features::from(x86::AVX2) | Features::from(x86::POPCNT) | Features::from(x86::LZCNT);
  assert_eq!(Features::from(combined), unioned);
  assert_eq!(combined.bits(), unioned.bits());
}

// ─────────────────────────────────────────────────────────────────────────────
// Materialization strategies agree
// ─────────────────────────────────────────────────────────────────────────────

static SSE_POINTER: DispatchedPointer<Kernel> = DispatchedPointer::new(SSE);
static SSE_ONCE: DispatchedOnce<Kernel> = DispatchedOnce::new(SSE);

dispatched_fn! {
  fn sse_name() -> &'static str = SSE;
}

#[test]
fn strategies_agree_with_direct_call() {
  let direct = (SSE.select(runtime_features()))();
  assert_eq!((SSE_POINTER.get())(), direct);
  assert_eq!((SSE_ONCE.get())(), direct);
  assert_eq!(sse_name(), direct);
  assert_eq!(SSE_ONCE.selected().tags, SSE.selected(runtime_features()).tags);
}

#[test]
fn selection_is_supported_by_runtime() {
  let features = runtime_features();
  assert!(features.supports(SSE.selected(features).tags));
  assert!(features.supports(AVX.selected(features).tags));
}

#[test]
fn pointer_replacement_for_tests() {
  static POINTER: DispatchedPointer<Kernel> = DispatchedPointer::new(SSE);

  let resolved = (POINTER.get())();
  POINTER.set(|| "mock");
  assert_eq!((POINTER.get())(), "mock");
  assert_eq!((POINTER.selected().func)(), resolved);

  POINTER.reset();
  assert_eq!((POINTER.get())(), resolved);
}
