use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::path::FAILED_MARKER_PREFIX;

/// A snapshot generation of a workspace.
///
/// `Checkpoint::LIVE` (`0`) is the unversioned location directly under the
/// working root. Every positive value names an immutable snapshot stored
/// under `{root}/{value}`. Ordering is numeric, never lexicographic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(u64);

impl Checkpoint {
    /// The live, unversioned checkpoint.
    pub const LIVE: Self = Self(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns `true` for the live checkpoint `0`.
    pub const fn is_live(self) -> bool {
        self.0 == 0
    }

    /// Parse a directory name found under a working root.
    ///
    /// Only canonical base-10 integers greater than zero are checkpoints.
    /// Failed-checkpoint markers, signed or padded numbers (`+3`, `007`) and
    /// anything else return `None`.
    ///
    /// ```
    /// use strata_types::Checkpoint;
    ///
    /// assert_eq!(Checkpoint::parse_dir_name("42"), Some(Checkpoint::new(42)));
    /// assert_eq!(Checkpoint::parse_dir_name("0__err_42"), None);
    /// assert_eq!(Checkpoint::parse_dir_name("007"), None);
    /// assert_eq!(Checkpoint::parse_dir_name("graph_vectors.bin"), None);
    /// ```
    pub fn parse_dir_name(name: &str) -> Option<Self> {
        if name.is_empty() || name.starts_with(FAILED_MARKER_PREFIX) {
            return None;
        }
        if !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        // Leading zeros would format back to a different directory name.
        if name.len() > 1 && name.starts_with('0') {
            return None;
        }
        match name.parse::<u64>() {
            Ok(0) | Err(_) => None,
            Ok(value) => Some(Self(value)),
        }
    }

    /// Parse a failed-checkpoint marker name (`0__err_{n}`).
    pub fn parse_failed_marker(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(FAILED_MARKER_PREFIX)?;
        Self::parse_dir_name(rest).or_else(|| (rest == "0").then_some(Self::LIVE))
    }

    /// The directory name a failed checkpoint is renamed to.
    pub fn failed_marker(self) -> String {
        format!("{FAILED_MARKER_PREFIX}{}", self.0)
    }

    /// Mint a fresh checkpoint from the wall clock (seconds since the UNIX
    /// epoch), strictly after `latest`.
    pub fn mint_after(latest: Option<Self>) -> Self {
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self::mint_at(now_secs, latest)
    }

    /// Deterministic form of [`Self::mint_after`] for a known clock reading.
    pub fn mint_at(now_secs: u64, latest: Option<Self>) -> Self {
        let floor = latest.map_or(1, |cp| cp.0.saturating_add(1));
        Self(now_secs.max(floor))
    }
}

impl From<u64> for Checkpoint {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_live() {
            write!(f, "Checkpoint(live)")
        } else {
            write!(f, "Checkpoint({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn live_is_zero() {
        assert!(Checkpoint::LIVE.is_live());
        assert!(!Checkpoint::new(3).is_live());
        assert_eq!(Checkpoint::LIVE.to_string(), "0");
        assert_eq!(format!("{:?}", Checkpoint::LIVE), "Checkpoint(live)");
    }

    #[test]
    fn parse_rejects_non_checkpoints() {
        for name in ["", "0", "-1", "+1", " 1", "1 ", "007", "1.5", "abc", "12abc"] {
            assert_eq!(Checkpoint::parse_dir_name(name), None, "{name:?}");
        }
        assert_eq!(Checkpoint::parse_dir_name("99999999999999999999999"), None);
    }

    #[test]
    fn parse_rejects_failed_markers() {
        assert_eq!(Checkpoint::parse_dir_name("0__err_5"), None);
        assert_eq!(
            Checkpoint::parse_failed_marker("0__err_5"),
            Some(Checkpoint::new(5))
        );
        assert_eq!(Checkpoint::parse_failed_marker("5"), None);
    }

    #[test]
    fn ordering_is_numeric() {
        let mut cps: Vec<Checkpoint> = ["9", "10", "100", "2"]
            .iter()
            .filter_map(|n| Checkpoint::parse_dir_name(n))
            .collect();
        cps.sort_unstable_by(|a, b| b.cmp(a));
        let values: Vec<u64> = cps.iter().map(|c| c.value()).collect();
        assert_eq!(values, vec![100, 10, 9, 2]);
    }

    #[test]
    fn failed_marker_format() {
        assert_eq!(Checkpoint::new(1700000000).failed_marker(), "0__err_1700000000");
    }

    #[test]
    fn mint_follows_clock() {
        let cp = Checkpoint::mint_at(1_700_000_000, Some(Checkpoint::new(5)));
        assert_eq!(cp, Checkpoint::new(1_700_000_000));
    }

    #[test]
    fn mint_is_strictly_after_latest() {
        let latest = Checkpoint::new(1_700_000_000);
        assert_eq!(
            Checkpoint::mint_at(1_700_000_000, Some(latest)),
            Checkpoint::new(1_700_000_001)
        );
        assert_eq!(Checkpoint::mint_at(10, Some(latest)), Checkpoint::new(1_700_000_001));
    }

    #[test]
    fn mint_never_yields_live() {
        assert_eq!(Checkpoint::mint_at(0, None), Checkpoint::new(1));
        assert!(!Checkpoint::mint_after(None).is_live());
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&Checkpoint::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Checkpoint::new(7));
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(value in 1u64..) {
            let cp = Checkpoint::new(value);
            prop_assert_eq!(Checkpoint::parse_dir_name(&cp.to_string()), Some(cp));
        }

        #[test]
        fn markers_never_discovered(value in 0u64..) {
            let marker = Checkpoint::new(value).failed_marker();
            prop_assert_eq!(Checkpoint::parse_dir_name(&marker), None);
        }
    }
}
