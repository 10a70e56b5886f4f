//! Fuzz target for feature-set algebra and parsing.
//!
//! Tests:
//! - Set identities: commutativity, distributivity, complement
//! - The subset order agrees with `contains`
//! - Parsing arbitrary text never panics and reports in-bounds error spans
//! - Display output of a known set parses back to the same set

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use platform::{Features, ParseFeaturesError, tag::x86};

#[derive(Arbitrary, Debug)]
struct Input {
  a: u32,
  b: u32,
  c: u32,
  text: String,
}

fuzz_target!(|input: Input| {
  let a = Features::from_bits(input.a);
  let b = Features::from_bits(input.b);
  let c = Features::from_bits(input.c);

  // ─── Identities ───
  assert_eq!(a | b, b | a, "union must be commutative");
  assert_eq!(a & b, b & a, "intersection must be commutative");
  assert_eq!(a & (b | c), (a & b) | (a & c), "intersection must distribute over union");
  assert_eq!(a & !a, Features::NONE, "a set and its complement are disjoint");
  assert_eq!(a ^ b, (a | b).difference(a & b), "xor is union minus intersection");

  // ─── Order ───
  assert_eq!(a >= b, a.contains(b));
  assert_eq!(a <= b, b.contains(a));
  assert!((a | b) >= a && (a & b) <= a);

  // ─── Normalization ───
  let n = a.normalized_in(&x86::TABLE);
  assert!(n >= a, "normalization only adds bits");
  assert_eq!(n.normalized_in(&x86::TABLE), n, "normalization is idempotent");

  // ─── Parsing ───
  match Features::parse_in(&x86::TABLE, &input.text) {
    Ok(parsed) => assert_eq!(parsed.restricted_to(&x86::TABLE), parsed),
    Err(ParseFeaturesError::UnknownTag { offset, len }) => {
      assert!(offset + len <= input.text.len(), "error span out of bounds");
    }
    Err(_) => {}
  }

  let known = a.restricted_to(&x86::TABLE);
  let text = known.names_in(&x86::TABLE).collect::<Vec<_>>().join("|");
  if !text.is_empty() {
    assert_eq!(Features::parse_in(&x86::TABLE, &text), Ok(known));
  }
});
