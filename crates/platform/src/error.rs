//! Recoverable errors.
//!
//! Malformed tag combinations are rejected during const evaluation and never
//! reach these types. What remains is configuration: overriding detection and
//! parsing feature lists.

/// Why a detection override was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OverrideError {
  /// Detection already ran and its result is cached for the process lifetime.
  AlreadyInitialized,
  /// The target cannot store an override (no `std` and no 32-bit atomics) or the lock is poisoned.
  Unsupported,
}

impl core::fmt::Display for OverrideError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Self::AlreadyInitialized => f.write_str("feature detection already initialized; overrides must be set first"),
      Self::Unsupported => f.write_str("feature overrides are not supported on this target"),
    }
  }
}

impl core::error::Error for OverrideError {}

/// Why a feature list failed to parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ParseFeaturesError {
  /// The input held no tag names.
  Empty,
  /// The name at `input[offset..offset + len]` is not a tag of the table.
  UnknownTag { offset: usize, len: usize },
}

impl ParseFeaturesError {
  /// The offending slice of the original input, if any.
  #[must_use]
  pub fn token<'a>(&self, input: &'a str) -> Option<&'a str> {
    match *self {
      Self::Empty => None,
      Self::UnknownTag { offset, len } => input.get(offset..offset.checked_add(len)?),
    }
  }
}

impl core::fmt::Display for ParseFeaturesError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Self::Empty => f.write_str("empty feature list"),
      Self::UnknownTag { offset, .. } => write!(f, "unknown instruction-set tag at byte {offset}"),
    }
  }
}

impl core::error::Error for ParseFeaturesError {}

#[cfg(test)]
mod tests {
  extern crate alloc;

  use alloc::string::ToString;

  use super::*;

  #[test]
  fn test_display() {
    assert_eq!(
      OverrideError::AlreadyInitialized.to_string(),
      "feature detection already initialized; overrides must be set first"
    );
    assert_eq!(ParseFeaturesError::Empty.to_string(), "empty feature list");
    assert_eq!(
      ParseFeaturesError::UnknownTag { offset: 3, len: 2 }.to_string(),
      "unknown instruction-set tag at byte 3"
    );
  }

  #[test]
  fn test_token_out_of_range() {
    let err = ParseFeaturesError::UnknownTag { offset: 10, len: 4 };
    assert_eq!(err.token("short"), None);
    assert_eq!(ParseFeaturesError::Empty.token("x"), None);
  }
}
