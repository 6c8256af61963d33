use actnode_encoding as enc;

/// `uavcan.primitive.scalar.Bit.1.0`
///
/// Fixed size 1 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bit {
    /// `saturated bool`
    ///
    /// Always aligned,
    /// size 1 bits
    pub value: bool,
}
impl enc::DataType for Bit {
    /// This type is sealed.
    const EXTENT_BYTES: Option<u32> = None;
}
impl enc::Message for Bit {}
impl enc::FixedSize for Bit {
    const SIZE_BYTES: usize = 1;
}
impl enc::Serialize for Bit {
    fn size_bits(&self) -> usize {
        8
    }
    fn serialize(&self, cursor: &mut enc::WriteCursor<'_>) {
        cursor.write_bool(self.value);
    }
}
impl enc::Deserialize for Bit {
    fn deserialize(
        cursor: &mut enc::ReadCursor<'_>,
    ) -> ::core::result::Result<Self, enc::DeserializeError>
    where
        Self: Sized,
    {
        Ok(Bit {
            value: { cursor.read_bool() },
        })
    }
}
