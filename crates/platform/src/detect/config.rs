// ─────────────────────────────────────────────────────────────────────────────
// Environment Configuration
// ─────────────────────────────────────────────────────────────────────────────

use crate::{Features, tag::ArchTable};

/// Environment variable restricting the detected features.
///
/// Holds a tag list such as `"sse41|popcnt"` or `"scalar"`. Base tags imply
/// the levels below them. The list is intersected with what the CPU reports, so
/// it can disable instruction sets but never enable unsupported ones. Read once,
/// on the first [`runtime_features()`](crate::runtime_features) call.
pub const FEATURES_ENV: &str = "ISATAG_FEATURES";

/// Apply [`FEATURES_ENV`] to `probed`, if set.
#[cfg(feature = "std")]
pub(crate) fn restrict_from_env(probed: Features) -> Features {
  match std::env::var(FEATURES_ENV) {
    Ok(value) => restrict(probed, &value),
    Err(_) => probed,
  }
}

/// Intersect `probed` with the feature list `value`. Invalid lists leave `probed` untouched.
#[cfg_attr(not(feature = "std"), allow(dead_code))]
pub(crate) fn restrict(probed: Features, value: &str) -> Features {
  let table = ArchTable::native();
  match Features::parse_in(table, value) {
    Ok(limit) => {
      let restricted = probed & limit.normalized_in(table);
      log::debug!("{FEATURES_ENV}={value:?} restricts {probed} to {restricted}");
      restricted
    }
    Err(err) => {
      match err.token(value) {
        Some(token) => log::warn!("ignoring {FEATURES_ENV}={value:?}: {err} ({token:?})"),
        None => log::warn!("ignoring {FEATURES_ENV}={value:?}: {err}"),
      }
      probed
    }
  }
}
