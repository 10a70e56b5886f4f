//! Fuzz target for variant selection.
//!
//! Builds an arbitrary table of well-formed x86 variants and checks the scan
//! against a brute-force search over every admissible variant.

#![no_main]

use arbitrary::Arbitrary;
use dispatch::{SelectError, Variant, is_admissible, priority, resolve};
use libfuzzer_sys::fuzz_target;
use platform::{Tags, tag::x86};

#[derive(Arbitrary, Debug)]
struct Combination {
  rank: u8,
  extras: u8,
}

impl Combination {
  fn tags(&self) -> Tags {
    let rank = u32::from(self.rank % 9);
    let base = if rank == 0 { 0 } else { 1 << (rank - 1) };
    Tags::from_bits(base | (u32::from(self.extras & 0xF) << 16))
  }
}

#[derive(Arbitrary, Debug)]
struct Input {
  variants: Vec<Combination>,
  call_site: Combination,
}

fuzz_target!(|input: Input| {
  if input.variants.len() > 64 {
    return;
  }

  let variants: Vec<Variant<usize>> = input
    .variants
    .iter()
    .enumerate()
    .map(|(i, c)| Variant::new(c.tags(), i))
    .collect();
  let call_site = input.call_site.tags();

  let admissible: Vec<_> = variants
    .iter()
    .filter(|v| is_admissible(v.tags, call_site))
    .map(|v| priority(v.tags, &x86::TABLE))
    .collect();
  let best = admissible.iter().max().copied();

  match resolve(&x86::TABLE, &variants, call_site) {
    Ok(chosen) => {
      assert!(is_admissible(chosen.tags, call_site));
      let p = priority(chosen.tags, &x86::TABLE);
      assert_eq!(Some(p), best);
      assert_eq!(admissible.iter().filter(|&&q| q == p).count(), 1, "winner must be unique");
    }
    Err(SelectError::Ambiguous { .. }) => {
      let top = best.expect("ambiguity needs admissible variants");
      assert!(admissible.iter().filter(|&&q| q == top).count() >= 2);
    }
    Err(SelectError::NoAdmissibleVariant) => assert!(admissible.is_empty()),
    Err(_) => unreachable!("unknown selection error"),
  }
});
