//! Log sequence numbers
//!
//! `SeqNum` is the logical clock of a shared log stream. The underlying
//! `u64` is treated as a position on a ring, with one reserved value:
//!
//! - **0 is `INITIAL`**: the position of an object that has never applied
//!   any log entry. No committed entry ever carries it, and ring movement
//!   (`next`/`prev`/`step`) skips over it.
//!
//! ## Ordering
//!
//! Two live sequence numbers compare by the *shorter arc* between them on
//! the ring ([`SeqNum::ring_cmp`]). `INITIAL` is defined as the minimum
//! element against every other value, so comparisons near the origin stay
//! intuitive even though the ring wraps.
//!
//! Ring comparison is not transitive, so this type deliberately does not
//! implement `Ord`. Use `ring_cmp`/`distance` for protocol decisions and
//! the raw [`SeqNum::value`] for map keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Position in a shared log stream.
///
/// Immutable value type. Obtain instances via [`SeqNum::new`] (rejects the
/// reserved 0), [`SeqNum::any`] (allows 0, used for `INITIAL` and values
/// parsed from untrusted input), or ring movement on an existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeqNum(u64);

impl SeqNum {
    /// Sequence number of an object that has not applied any entry.
    ///
    /// Reserved: no committed log entry is ever keyed by this value.
    pub const INITIAL: SeqNum = SeqNum(0);

    /// Creates a sequence number for a committed entry position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `value` is 0, which is
    /// reserved for [`SeqNum::INITIAL`].
    pub fn new(value: u64) -> Result<SeqNum> {
        if value == 0 {
            return Err(Error::InvalidArgument(
                "sequence number 0 is reserved for INITIAL".to_string(),
            ));
        }
        Ok(SeqNum(value))
    }

    /// Creates a sequence number from any raw value, including 0.
    pub const fn any(value: u64) -> SeqNum {
        SeqNum(value)
    }

    /// Raw unsigned value.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Whether this is the reserved initial position.
    #[inline]
    pub const fn is_initial(&self) -> bool {
        self.0 == 0
    }

    /// Next position on the ring, skipping the reserved 0.
    ///
    /// This only computes the successor; it does not allocate anything.
    /// Slot allocation goes through the sequencer.
    pub fn next(&self) -> SeqNum {
        self.step(1)
    }

    /// Previous position on the ring, skipping the reserved 0.
    pub fn prev(&self) -> SeqNum {
        self.step(-1)
    }

    /// Position `delta` steps away on the ring.
    ///
    /// If the step lands exactly on the reserved 0, it moves one further
    /// in the same direction.
    pub fn step(&self, delta: i64) -> SeqNum {
        let stepped = self.0.wrapping_add(delta as u64);
        if stepped == 0 {
            if delta >= 0 {
                SeqNum(1)
            } else {
                SeqNum(u64::MAX)
            }
        } else {
            SeqNum(stepped)
        }
    }

    /// Signed ring distance `other - self`.
    ///
    /// Distances from or to `INITIAL` are always measured clockwise, so
    /// `INITIAL` acts as the smallest element. For any other pair the
    /// shorter arc decides the sign. When both arcs are exactly equal
    /// (half a ring apart) the result is `±i64::MAX` and the arc
    /// containing `INITIAL` is treated as the shorter one.
    ///
    /// The half-ring tie-break is a compatibility rule carried over from
    /// the wire protocol; do not "fix" it without versioning the format.
    pub fn distance(&self, other: &SeqNum) -> i64 {
        if self.is_initial() {
            let raw = other.0 as i64;
            return if raw >= 0 { raw } else { i64::MAX };
        }
        if other.is_initial() {
            let raw = self.0 as i64;
            return if raw >= 0 { -raw } else { -i64::MAX };
        }

        let diff = other.0.wrapping_sub(self.0) as i64;
        if diff == i64::MIN {
            // Exactly half the ring apart; pick the arc containing INITIAL.
            if (self.0 as i64) < 0 {
                i64::MAX
            } else {
                -i64::MAX
            }
        } else {
            diff
        }
    }

    /// Shorter-arc ordering between two ring positions.
    ///
    /// `INITIAL` orders below everything else. Not transitive across the
    /// whole ring; see the module docs for why `Ord` is not implemented.
    pub fn ring_cmp(&self, other: &SeqNum) -> std::cmp::Ordering {
        self.distance(other).cmp(&0).reverse()
    }

    /// Value as `f64`, treating the payload as unsigned.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }
}

impl fmt::Display for SeqNum {
    /// Unsigned decimal form; values >= 2^63 never render negative.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SeqNum {
    type Err = Error;

    /// Parses unsigned decimal or `0x`-prefixed hexadecimal.
    ///
    /// Both forms produce the same `SeqNum` for equal magnitudes. The
    /// reserved 0 parses successfully (to `INITIAL`); callers that need a
    /// committed-entry position should follow up with [`SeqNum::new`].
    fn from_str(s: &str) -> Result<SeqNum> {
        let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            u64::from_str_radix(hex, 16)
        } else {
            s.parse::<u64>()
        };
        parsed
            .map(SeqNum::any)
            .map_err(|e| Error::InvalidArgument(format!("bad sequence number {:?}: {}", s, e)))
    }
}

impl From<SeqNum> for u64 {
    fn from(seq: SeqNum) -> u64 {
        seq.0
    }
}
