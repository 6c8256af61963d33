//! Cyphal/CAN extended identifier layout for message frames
//!
//! ```text
//!  28 26 25 24 23 22 21 20          8  7  6      0
//! ┌─────┬──┬──┬──┬─────┬─────────────┬──┬────────┐
//! │prio │sv│an│r0│ 1 1 │ subject id  │r0│ source │
//! └─────┴──┴──┴──┴─────┴─────────────┴──┴────────┘
//! ```
//! `sv` is the service flag and `an` the anonymous flag. Service frames are not handled
//! by the actuator node and fail to parse.

use actnode_core::{NodeId, Priority, SubjectId};

const CAN_ID_MASK: u32 = lsb_mask(29);
const NODE_ID_MASK: u32 = lsb_mask(7);
const SUBJECT_ID_MASK: u32 = lsb_mask(13);
const PRIORITY_MASK: u32 = lsb_mask(3);

const PRIORITY_OFFSET: u32 = 26;
const SOURCE_OFFSET: u32 = 0;
const SUBJECT_OFFSET: u32 = 8;

const SERVICE_FLAG: u32 = 1 << 25;
const ANONYMOUS_FLAG: u32 = 1 << 24;
const RES_23_FLAG: u32 = 1 << 23;
const RES_7_FLAG: u32 = 1 << 7;

const CHECK_MASK: u32 = SERVICE_FLAG | RES_23_FLAG | RES_7_FLAG;
const CHECK_VALUE: u32 = 0;
// Bits 21 and 22 are transmitted as ones and ignored on reception.
const IGNORE_MASK: u32 = CAN_ID_MASK
    & !CHECK_MASK
    & !(PRIORITY_MASK << PRIORITY_OFFSET)
    & !ANONYMOUS_FLAG
    & !(SUBJECT_ID_MASK << SUBJECT_OFFSET)
    & !(NODE_ID_MASK << SOURCE_OFFSET);

/// Message frame identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageCanId(u32);

impl MessageCanId {
    pub const fn new() -> Self {
        Self(CHECK_VALUE | IGNORE_MASK)
    }

    /// Returns `None` for service frames and frames with reserved bits set
    pub const fn from_can_id(can_id: u32) -> Option<Self> {
        if can_id & CHECK_MASK == CHECK_VALUE {
            Some(Self(can_id & CAN_ID_MASK | IGNORE_MASK))
        } else {
            None
        }
    }

    pub const fn priority(self) -> Priority {
        Priority::from_u8_truncating((self.0 >> PRIORITY_OFFSET) as u8)
    }

    pub const fn set_priority(&mut self, value: Priority) {
        self.0 &= !(PRIORITY_MASK << PRIORITY_OFFSET);
        self.0 |= (value.into_u8() as u32) << PRIORITY_OFFSET;
    }

    pub const fn anonymous(self) -> bool {
        self.0 & ANONYMOUS_FLAG != 0
    }

    pub const fn set_anonymous(&mut self, value: bool) {
        if value {
            self.0 |= ANONYMOUS_FLAG;
        } else {
            self.0 &= !ANONYMOUS_FLAG;
        }
    }

    pub const fn subject(self) -> SubjectId {
        SubjectId::from_u16_truncating((self.0 >> SUBJECT_OFFSET) as u16)
    }

    pub const fn set_subject(&mut self, value: SubjectId) {
        self.0 &= !(SUBJECT_ID_MASK << SUBJECT_OFFSET);
        self.0 |= (value.into_u16() as u32) << SUBJECT_OFFSET;
    }

    /// Source node field; a pseudo-ID for anonymous frames
    pub const fn source(self) -> NodeId {
        NodeId::from_u8_truncating((self.0 >> SOURCE_OFFSET) as u8)
    }

    pub const fn set_source(&mut self, value: NodeId) {
        self.0 &= !(NODE_ID_MASK << SOURCE_OFFSET);
        self.0 |= (value.into_u8() as u32) << SOURCE_OFFSET;
    }

    pub const fn into_u32(self) -> u32 {
        self.0
    }
}

impl Default for MessageCanId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<MessageCanId> for u32 {
    fn from(value: MessageCanId) -> Self {
        value.into_u32()
    }
}

/// Transport data encoded with a message frame identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header {
    pub priority: Priority,
    pub subject: SubjectId,
    /// `None` for anonymous transfers
    pub source: Option<NodeId>,
}

impl Header {
    pub const fn parse(can_id: u32) -> Option<Self> {
        let Some(id) = MessageCanId::from_can_id(can_id) else {
            return None;
        };
        Some(Self {
            priority: id.priority(),
            subject: id.subject(),
            source: if id.anonymous() {
                None
            } else {
                Some(id.source())
            },
        })
    }

    /// Builds the identifier of a non-anonymous message frame
    pub const fn message_id(priority: Priority, subject: SubjectId, source: NodeId) -> u32 {
        let mut id = MessageCanId::new();
        id.set_priority(priority);
        id.set_subject(subject);
        id.set_source(source);
        id.into_u32()
    }
}

const fn lsb_mask(n: u32) -> u32 {
    if n > 0 {
        u32::MAX >> (u32::BITS - n)
    } else {
        0
    }
}
