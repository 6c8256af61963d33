use crate::core::SubjectId;
use actnode_encoding as enc;

/// `uavcan.node.Heartbeat.1.0`
///
/// Fixed size 7 bytes
///
/// Abstract node status information, published on a fixed subject by every node with an ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Heartbeat {
    /// \[second\]
    /// Saturates at 0xFFFFFFFF instead of wrapping.
    ///
    /// `saturated uint32`
    ///
    /// Always aligned,
    /// size 32 bits
    pub uptime: u32,
    /// `uavcan.node.Health.1.0`
    ///
    /// Always aligned,
    /// size 8 bits
    pub health: Health,
    /// `uavcan.node.Mode.1.0`
    ///
    /// Always aligned,
    /// size 8 bits
    pub mode: Mode,
    /// `saturated uint8`
    ///
    /// Always aligned,
    /// size 8 bits
    pub vendor_specific_status_code: u8,
}
impl enc::DataType for Heartbeat {
    /// This type is delimited with an extent of 12 bytes.
    const EXTENT_BYTES: Option<u32> = Some(12);
}
impl enc::Message for Heartbeat {}
impl enc::FixedSize for Heartbeat {
    const SIZE_BYTES: usize = 7;
}
impl Heartbeat {
    /// The fixed subject ID for this message type
    pub const SUBJECT: SubjectId = SubjectId::new(7509).unwrap();

    /// \[second\]
    pub const MAX_PUBLICATION_PERIOD: u16 = 1;
}
impl enc::Serialize for Heartbeat {
    fn size_bits(&self) -> usize {
        56
    }
    fn serialize(&self, cursor: &mut enc::WriteCursor<'_>) {
        cursor.write_aligned_u32(self.uptime);
        cursor.write_composite(&self.health);
        cursor.write_composite(&self.mode);
        cursor.write_aligned_u8(self.vendor_specific_status_code);
    }
}
impl enc::Deserialize for Heartbeat {
    fn deserialize(
        cursor: &mut enc::ReadCursor<'_>,
    ) -> ::core::result::Result<Self, enc::DeserializeError>
    where
        Self: Sized,
    {
        Ok(Heartbeat {
            uptime: { cursor.read_u32() as _ },
            health: { cursor.read_composite()? },
            mode: { cursor.read_composite()? },
            vendor_specific_status_code: { cursor.read_u8() as _ },
        })
    }
}

/// `uavcan.node.Health.1.0`
///
/// Fixed size 1 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Health {
    Nominal,
    /// Minor failure; real-time functions still available.
    Advisory,
    /// Degraded mode.
    Caution,
    /// Unable to perform the intended function.
    Warning,
}
impl enc::DataType for Health {
    /// This type is sealed.
    const EXTENT_BYTES: Option<u32> = None;
}
impl enc::Message for Health {}
impl Health {
    pub const fn into_u8(self) -> u8 {
        match self {
            Health::Nominal => 0,
            Health::Advisory => 1,
            Health::Caution => 2,
            Health::Warning => 3,
        }
    }

    pub const fn from_u8_truncating(value: u8) -> Self {
        match value & 0x3 {
            0 => Health::Nominal,
            1 => Health::Advisory,
            2 => Health::Caution,
            _ => Health::Warning,
        }
    }
}
impl enc::Serialize for Health {
    fn size_bits(&self) -> usize {
        8
    }
    fn serialize(&self, cursor: &mut enc::WriteCursor<'_>) {
        cursor.write_u2(self.into_u8());
    }
}
impl enc::Deserialize for Health {
    fn deserialize(
        cursor: &mut enc::ReadCursor<'_>,
    ) -> ::core::result::Result<Self, enc::DeserializeError>
    where
        Self: Sized,
    {
        Ok(Health::from_u8_truncating(cursor.read_u2() as _))
    }
}

/// `uavcan.node.Mode.1.0`
///
/// Fixed size 1 bytes
///
/// Values 4 to 7 are reserved and fail to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Operational,
    /// Entered right after startup.
    Initialization,
    Maintenance,
    SoftwareUpdate,
}
impl enc::DataType for Mode {
    /// This type is sealed.
    const EXTENT_BYTES: Option<u32> = None;
}
impl enc::Message for Mode {}
impl Mode {
    pub const fn into_u8(self) -> u8 {
        match self {
            Mode::Operational => 0,
            Mode::Initialization => 1,
            Mode::Maintenance => 2,
            Mode::SoftwareUpdate => 3,
        }
    }

    pub const fn try_from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Mode::Operational),
            1 => Some(Mode::Initialization),
            2 => Some(Mode::Maintenance),
            3 => Some(Mode::SoftwareUpdate),
            _ => None,
        }
    }
}
impl enc::Serialize for Mode {
    fn size_bits(&self) -> usize {
        8
    }
    fn serialize(&self, cursor: &mut enc::WriteCursor<'_>) {
        cursor.write_u3(self.into_u8());
    }
}
impl enc::Deserialize for Mode {
    fn deserialize(
        cursor: &mut enc::ReadCursor<'_>,
    ) -> ::core::result::Result<Self, enc::DeserializeError>
    where
        Self: Sized,
    {
        Mode::try_from_u8(cursor.read_u3() as _).ok_or(enc::DeserializeError::UnionTag)
    }
}
