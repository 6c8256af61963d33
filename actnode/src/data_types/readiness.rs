use actnode_encoding as enc;

/// `reg.udral.service.common.Readiness.0.1`
///
/// Size ranges from 1 to 1 bytes
///
/// Coarse actuator permission level. Only `ENGAGED` lets the node drive its outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Readiness {
    /// `truncated uint2`
    ///
    /// Always aligned,
    /// size 2 bits
    pub value: u8,
}
impl enc::DataType for Readiness {
    /// This type is delimited with an extent of 8 bytes.
    const EXTENT_BYTES: Option<u32> = Some(8);
}
impl enc::Message for Readiness {}
impl enc::FixedSize for Readiness {
    const SIZE_BYTES: usize = 1;
}
impl Readiness {
    pub const SLEEP: u8 = 0;
    pub const STANDBY: u8 = 2;
    pub const ENGAGED: u8 = 3;

    pub const fn new(value: u8) -> Self {
        Self { value: value & 0x3 }
    }
}
impl enc::Serialize for Readiness {
    fn size_bits(&self) -> usize {
        8
    }
    fn serialize(&self, cursor: &mut enc::WriteCursor<'_>) {
        cursor.write_u2(self.value & 0x3);
    }
}
impl enc::Deserialize for Readiness {
    fn deserialize(
        cursor: &mut enc::ReadCursor<'_>,
    ) -> ::core::result::Result<Self, enc::DeserializeError>
    where
        Self: Sized,
    {
        Ok(Readiness {
            value: { cursor.read_u2() as _ },
        })
    }
}
