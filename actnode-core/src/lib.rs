//! Cyphal protocol primitives
//!
//! Identifier types shared by the driver interface and the actuator node stack.
//! Applications normally reach them through the `actnode::core` reexport.
#![no_std]

/// Raw value outside the range of an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidValue;

/// Transfer priority
///
/// The numeric encoding matches the 3-bit priority field of the CAN ID, so a lower
/// value wins arbitration: `Exceptional` is the most urgent level, `Optional` the least.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Priority {
    /// Reserved for total system failure handling; ignored in bus load budgets.
    Exceptional = 0,
    Immediate = 1,
    Fast = 2,
    /// Safety commands that must get through a bus flooded with nominal traffic.
    High = 3,
    /// Default level; heartbeats and actuator feedback use it.
    Nominal = 4,
    Low = 5,
    Slow = 6,
    /// Diagnostics that may never be sent under load.
    Optional = 7,
}

impl Priority {
    pub const COUNT: usize = 8;

    pub const fn try_from_u8(code: u8) -> Option<Priority> {
        if (code as usize) < Self::COUNT {
            Some(Priority::from_u8_truncating(code))
        } else {
            None
        }
    }

    pub const fn from_u8_truncating(code: u8) -> Priority {
        match code & 0x7 {
            0 => Priority::Exceptional,
            1 => Priority::Immediate,
            2 => Priority::Fast,
            3 => Priority::High,
            4 => Priority::Nominal,
            5 => Priority::Low,
            6 => Priority::Slow,
            7 => Priority::Optional,
            _ => unreachable!(),
        }
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }
}

impl From<Priority> for usize {
    fn from(value: Priority) -> Self {
        value.into_u8().into()
    }
}

/// A set of priority levels
///
/// Higher priority has a lower numerical value and is ordered first,
/// so `first()` yields the most urgent member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrioritySet(u8);

impl PrioritySet {
    pub const NONE: Self = Self(0);

    const fn mask(priority: Priority) -> u8 {
        1u8 << priority.into_u8()
    }

    pub const fn contains(&self, priority: Priority) -> bool {
        self.0 & Self::mask(priority) != 0
    }

    pub const fn insert(&mut self, priority: Priority) {
        self.0 |= Self::mask(priority)
    }

    pub const fn remove(&mut self, priority: Priority) {
        self.0 &= !Self::mask(priority)
    }

    pub const fn first(&self) -> Option<Priority> {
        Priority::try_from_u8(self.0.trailing_zeros() as u8)
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == Self::NONE.0
    }
}

impl Default for PrioritySet {
    fn default() -> Self {
        PrioritySet::NONE
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeId(u8);

impl NodeId {
    const MAX_VALUE: u8 = 0x7f;

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self::from_u8_truncating(value))
        } else {
            None
        }
    }

    pub const fn from_u8_truncating(value: u8) -> Self {
        Self(value & Self::MAX_VALUE)
    }

    pub const fn into_u8(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for NodeId {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubjectId(u16);

impl SubjectId {
    const MAX_VALUE: u16 = 0x1fff;

    pub const fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self::from_u16_truncating(value))
        } else {
            None
        }
    }

    pub const fn from_u16_truncating(value: u16) -> Self {
        Self(value & Self::MAX_VALUE)
    }

    pub const fn into_u16(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for SubjectId {
    type Error = InvalidValue;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

/// 5-bit transfer identifier of the CAN transport
///
/// Values wrap modulo 32, so ordering is only meaningful within half of that range.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferId(u8);

impl TransferId {
    const MAX_VALUE: u8 = 0x1f;
    const HALF_RANGE: u8 = (Self::MAX_VALUE >> 1) + 1;
    pub const MAX: TransferId = TransferId(Self::MAX_VALUE);

    /// Identifier of the first transfer a publisher emits
    pub const SESSION_START: TransferId = TransferId(0);

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self::from_u8_truncating(value))
        } else {
            None
        }
    }

    pub const fn from_u8_truncating(value: u8) -> Self {
        Self(value & Self::MAX_VALUE)
    }

    pub const fn into_u8(self) -> u8 {
        self.0
    }

    pub const fn next(self) -> Self {
        Self::from_u8_truncating(self.0.wrapping_add(1))
    }

    /// Returns true if `self` is 1 to 16 steps ahead of `previous` modulo 32
    ///
    /// An identifier equal to `previous` or up to 15 steps behind it is a duplicate
    /// or a stale transfer.
    pub const fn follows(self, previous: TransferId) -> bool {
        let behind = previous.0.wrapping_sub(self.0) & Self::MAX_VALUE;
        behind >= Self::HALF_RANGE
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::SESSION_START
    }
}
