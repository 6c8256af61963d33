use crate::core::TransferId;

/// CRC-16/CCITT-FALSE protecting multi-frame transfers
///
/// Running the CRC over a payload followed by its big-endian CRC yields zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferCrc(u16);

impl Default for TransferCrc {
    fn default() -> Self {
        Self(Self::INIT_VALUE)
    }
}

impl TransferCrc {
    pub const LENGTH: usize = 2;
    const INIT_VALUE: u16 = 0xffff;
    const POLYNOMIAL: u16 = 0x1021;

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u16::from(byte) << 8;
            for _ in 0..8 {
                let carry = self.0 & 0x8000 != 0;
                self.0 <<= 1;
                if carry {
                    self.0 ^= Self::POLYNOMIAL;
                }
            }
        }
    }

    pub fn get(&self) -> u16 {
        self.0
    }

    pub fn is_residue_valid(&self) -> bool {
        self.0 == 0
    }
}

/// Last byte of every Cyphal/CAN frame
///
/// Bit 7 marks the start of a transfer, bit 6 its end and bit 5 alternates between frames.
/// The low five bits carry the transfer ID.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailByte(u8);

impl TailByte {
    const SOT: u8 = 0x80;
    const EOT: u8 = 0x40;
    const TOGGLE: u8 = 0x20;
    const TRANSFER_ID: u8 = 0x1f;

    pub fn new(sot: bool, eot: bool, toggle: bool, transfer_id: TransferId) -> Self {
        let flag = |set: bool, mask: u8| if set { mask } else { 0 };
        Self(
            flag(sot, Self::SOT)
                | flag(eot, Self::EOT)
                | flag(toggle, Self::TOGGLE)
                | transfer_id.into_u8(),
        )
    }

    pub fn sot(&self) -> bool {
        self.0 & Self::SOT != 0
    }

    pub fn eot(&self) -> bool {
        self.0 & Self::EOT != 0
    }

    pub fn toggle(&self) -> bool {
        self.0 & Self::TOGGLE != 0
    }

    pub fn transfer_id(&self) -> TransferId {
        TransferId::from_u8_truncating(self.0 & Self::TRANSFER_ID)
    }
}

impl From<TailByte> for u8 {
    fn from(value: TailByte) -> Self {
        value.0
    }
}

impl From<u8> for TailByte {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

pub const TAIL_LENGTH: usize = 1;

/// Toggle bit value of a start-of-transfer frame
pub const SOT_TOGGLE_BIT: bool = true;

pub const PAD_VALUE: u8 = 0;
