//! Validity windows.
//!
//! An [`Iov`] ("interval of validity") is a half-open range `[lower, upper)`
//! over one [`IovKind`] of axis. Windows on different axes are unrelated:
//! they never contain or intersect one another.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CondorResult, ValidationError};

/// The axis a validity window is measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IovKind {
    /// Run numbers
    Run,
    /// Event sequence numbers within a data stream
    Sequence,
    /// Wall-clock time in seconds since the Unix epoch
    Timestamp,
    /// Application-defined axis
    Custom(u32),
}

impl fmt::Display for IovKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IovKind::Run => write!(f, "run"),
            IovKind::Sequence => write!(f, "seq"),
            IovKind::Timestamp => write!(f, "time"),
            IovKind::Custom(id) => write!(f, "custom{}", id),
        }
    }
}

/// Half-open validity window `[lower, upper)`.
///
/// Construction rejects empty and inverted windows, so every `Iov` contains
/// at least one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Iov {
    kind: IovKind,
    lower: i64,
    upper: i64,
}

impl Iov {
    /// Create a window, failing if `lower >= upper`.
    pub fn new(kind: IovKind, lower: i64, upper: i64) -> CondorResult<Self> {
        if lower >= upper {
            return Err(ValidationError::EmptyWindow { lower, upper }.into());
        }
        Ok(Self { kind, lower, upper })
    }

    /// The widest window on an axis.
    pub fn unbounded(kind: IovKind) -> Self {
        Self {
            kind,
            lower: i64::MIN,
            upper: i64::MAX,
        }
    }

    /// A window covering exactly one point.
    pub fn point(kind: IovKind, at: i64) -> CondorResult<Self> {
        let upper = at.checked_add(1).ok_or(ValidationError::EmptyWindow {
            lower: at,
            upper: at,
        })?;
        Self::new(kind, at, upper)
    }

    pub fn kind(&self) -> IovKind {
        self.kind
    }

    pub fn lower(&self) -> i64 {
        self.lower
    }

    pub fn upper(&self) -> i64 {
        self.upper
    }

    /// Check whether `other` lies entirely inside this window.
    pub fn contains(&self, other: &Iov) -> bool {
        self.kind == other.kind && self.lower <= other.lower && other.upper <= self.upper
    }

    pub fn contains_point(&self, at: i64) -> bool {
        self.lower <= at && at < self.upper
    }

    pub fn intersects(&self, other: &Iov) -> bool {
        self.kind == other.kind && self.lower < other.upper && other.lower < self.upper
    }

    /// The overlap of two windows, or `None` when they are disjoint.
    pub fn intersection(&self, other: &Iov) -> Option<Iov> {
        if !self.intersects(other) {
            return None;
        }
        Some(Iov {
            kind: self.kind,
            lower: self.lower.max(other.lower),
            upper: self.upper.min(other.upper),
        })
    }

    /// Width of the window, saturating for unbounded windows.
    pub fn span(&self) -> u64 {
        (self.upper as i128 - self.lower as i128).min(u64::MAX as i128) as u64
    }
}

impl fmt::Display for Iov {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}, {})", self.kind, self.lower, self.upper)
    }
}
