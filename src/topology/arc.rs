//! `ArcRef`: a signed, zero-cost handle into an [`ArcPool`](super::arc_pool::ArcPool)
//!
//! Shapes never own boundary coordinates. Each part of a polyline or polygon
//! is a list of `ArcRef`s, and each reference names one arc of the owning
//! dataset's pool plus a traversal direction:
//! - `ArcRef(i)` with `i >= 0` walks arc `i` forward;
//! - `ArcRef(!i)` (always negative) walks arc `i` in reverse.
//!
//! Two polygons sharing a border hold `ArcRef(i)` and `ArcRef(!i)`
//! respectively, so the border's coordinates are stored exactly once.
//!
//! An `ArcRef` is only meaningful relative to the pool it was issued by;
//! moving one between datasets requires [`ArcRef::shifted`] after appending
//! the source pool to the target pool.

use std::fmt;

#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct ArcRef(i32);

impl ArcRef {
    /// Forward reference to arc `index`.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use topo_shaper::topology::arc::ArcRef;
    /// let a = ArcRef::forward(3);
    /// assert_eq!(a.index(), 3);
    /// assert!(!a.is_reversed());
    /// assert!(a.reversed().is_reversed());
    /// ```
    #[inline]
    pub const fn forward(index: u32) -> Self {
        ArcRef(index as i32)
    }

    /// Reverse reference to arc `index`.
    #[inline]
    pub const fn reverse(index: u32) -> Self {
        ArcRef(!(index as i32))
    }

    /// Wraps a raw signed id as stored in TopoJSON-style arc lists.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        ArcRef(raw)
    }

    /// The raw signed id.
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Index of the referenced arc in its pool.
    #[inline]
    pub const fn index(self) -> usize {
        if self.0 < 0 {
            (!self.0) as usize
        } else {
            self.0 as usize
        }
    }

    #[inline]
    pub const fn is_reversed(self) -> bool {
        self.0 < 0
    }

    /// Same arc, opposite direction.
    #[inline]
    pub const fn reversed(self) -> Self {
        ArcRef(!self.0)
    }

    /// Same direction, arc index moved by `offset` (pool concatenation).
    #[inline]
    pub fn shifted(self, offset: usize) -> Self {
        let index = (self.index() + offset) as u32;
        if self.is_reversed() {
            ArcRef::reverse(index)
        } else {
            ArcRef::forward(index)
        }
    }
}

impl fmt::Debug for ArcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_reversed() {
            write!(f, "ArcRef(~{})", self.index())
        } else {
            write!(f, "ArcRef({})", self.index())
        }
    }
}

impl fmt::Display for ArcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reverses a ring or path expressed as arc references.
pub fn reverse_path(path: &[ArcRef]) -> Vec<ArcRef> {
    path.iter().rev().map(|a| a.reversed()).collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complement_encodes_direction() {
        let fwd = ArcRef::forward(0);
        let rev = ArcRef::reverse(0);
        assert_eq!(rev.raw(), -1);
        assert_eq!(fwd.index(), rev.index());
        assert_eq!(fwd.reversed(), rev);
        assert_eq!(rev.reversed(), fwd);
    }

    #[test]
    fn shifting_keeps_direction() {
        assert_eq!(ArcRef::forward(2).shifted(5), ArcRef::forward(7));
        assert_eq!(ArcRef::reverse(2).shifted(5), ArcRef::reverse(7));
    }

    #[test]
    fn debug_and_display() {
        assert_eq!(format!("{:?}", ArcRef::reverse(4)), "ArcRef(~4)");
        assert_eq!(format!("{}", ArcRef::reverse(4)), "-5");
    }

    #[test]
    fn reverse_path_flips_order_and_direction() {
        let path = [ArcRef::forward(0), ArcRef::reverse(1)];
        assert_eq!(
            reverse_path(&path),
            vec![ArcRef::forward(1), ArcRef::reverse(0)]
        );
    }
}
