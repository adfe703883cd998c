//! Saturating counters backing every size metric in the crate.
//!
//! Adversarial repositories produce expanded footprints far beyond 2^32, so
//! arithmetic here pins at the type maximum instead of wrapping. A pinned
//! counter reads back with an overflow flag the reporter can render as ∞.
//! Most metrics fit 32 bits, which halves the memory of the largest maps; the
//! history-wide byte sums use the 64-bit width.

use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeStruct};

/// 32-bit saturating counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Count32(u32);

/// 64-bit saturating counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Count64(u64);

impl Count32 {
    pub const MAX: Count32 = Count32(u32::MAX);

    /// Construct from a 64-bit input, clamping anything over `u32::MAX`.
    pub fn new(value: u64) -> Count32 {
        Count32(value.min(u32::MAX as u64) as u32)
    }

    /// Saturating sum of two counters.
    pub fn plus(self, other: Count32) -> Count32 {
        Count32(self.0.saturating_add(other.0))
    }

    /// In-place saturating addition.
    pub fn increment(&mut self, other: Count32) {
        *self = self.plus(other);
    }

    /// Raise self to `other` if larger. Returns whether the value changed,
    /// which gates updates to the path associated with a maximum; ties do not
    /// displace the incumbent.
    pub fn adjust_max(&mut self, other: Count32) -> bool {
        if other.0 > self.0 {
            self.0 = other.0;
            true
        } else {
            false
        }
    }

    /// Read the value together with the overflow flag. A counter pinned at
    /// the type maximum reports as overflowed; saturation keeps the flag
    /// sticky through every subsequent addition.
    pub fn to_u64(self) -> (u64, bool) {
        (self.0 as u64, self.0 == u32::MAX)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Count64 {
    pub const MAX: Count64 = Count64(u64::MAX);

    pub fn new(value: u64) -> Count64 {
        Count64(value)
    }

    /// Saturating sum of two counters.
    pub fn plus(self, other: Count64) -> Count64 {
        Count64(self.0.saturating_add(other.0))
    }

    /// In-place saturating addition.
    pub fn increment(&mut self, other: Count64) {
        *self = self.plus(other);
    }

    /// Raise self to `other` if larger; ties do not displace.
    pub fn adjust_max(&mut self, other: Count64) -> bool {
        if other.0 > self.0 {
            self.0 = other.0;
            true
        } else {
            false
        }
    }

    /// Read the value together with the overflow flag.
    pub fn to_u64(self) -> (u64, bool) {
        (self.0, self.0 == u64::MAX)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<Count32> for Count64 {
    fn from(c: Count32) -> Count64 {
        Count64(c.0 as u64)
    }
}

impl fmt::Display for Count32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (value, overflow) = self.to_u64();
        if overflow { write!(f, "∞") } else { write!(f, "{value}") }
    }
}

impl fmt::Display for Count64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (value, overflow) = self.to_u64();
        if overflow { write!(f, "∞") } else { write!(f, "{value}") }
    }
}

impl Serialize for Count32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (value, overflow) = self.to_u64();
        let mut s = serializer.serialize_struct("Count32", 2)?;
        s.serialize_field("value", &value)?;
        s.serialize_field("overflow", &overflow)?;
        s.end()
    }
}

impl Serialize for Count64 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (value, overflow) = self.to_u64();
        let mut s = serializer.serialize_struct("Count64", 2)?;
        s.serialize_field("value", &value)?;
        s.serialize_field("overflow", &overflow)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::quickcheck;

    use super::{Count32, Count64};

    /// Addition near the top of the range pins at the maximum and reports
    /// overflow.
    #[test]
    fn test_count32_saturates() {
        let mut c = Count32::new(0xF000_0000);
        c.increment(Count32::new(0xF000_0000));
        assert_eq!(c.to_u64(), (0xFFFF_FFFF, true));
    }

    /// A counter pinned at the maximum stays pinned under any addition.
    #[test]
    fn test_count32_sticky_at_max() {
        let mut c = Count32::MAX;
        c.increment(Count32::new(1));
        assert_eq!(c, Count32::MAX);
        assert_eq!(c.plus(Count32::new(12345)), Count32::MAX);
    }

    /// Clamping construction from a 64-bit input.
    #[test]
    fn test_count32_new_clamps() {
        assert_eq!(Count32::new(u64::MAX).to_u64(), (u32::MAX as u64, true));
        assert_eq!(Count32::new(7).to_u64(), (7, false));
    }

    /// `adjust_max` raises the value only when strictly larger.
    #[test]
    fn test_adjust_max_keeps_earliest_on_tie() {
        let mut c = Count32::new(10);
        assert!(!c.adjust_max(Count32::new(10)));
        assert!(!c.adjust_max(Count32::new(3)));
        assert!(c.adjust_max(Count32::new(11)));
        assert_eq!(c.value(), 11);
    }

    /// 64-bit saturation at the top of the range.
    #[test]
    fn test_count64_saturates() {
        let mut c = Count64::new(u64::MAX - 1);
        c.increment(Count64::new(5));
        assert_eq!(c.to_u64(), (u64::MAX, true));
    }

    quickcheck! {
        /// plus() equals the mathematical sum clamped to the type maximum.
        fn prop_plus_is_clamped_sum(a: u32, b: u32) -> bool {
            let sum = (a as u64 + b as u64).min(u32::MAX as u64);
            Count32::new(a as u64).plus(Count32::new(b as u64)).to_u64().0 == sum
        }

        /// adjust_max computes the maximum of both operands.
        fn prop_adjust_max(a: u64, b: u64) -> bool {
            let mut c = Count64::new(a);
            c.adjust_max(Count64::new(b));
            c.value() == a.max(b)
        }
    }
}
