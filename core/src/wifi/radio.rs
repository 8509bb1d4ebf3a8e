use super::regs::bb_reg_writable;
use crate::firmware::{ChannelTuning, WifiSettings};

pub const BB_CHANNEL_REG: u8 = 0x1E;
pub const RF_CHANNEL_REG: u8 = 5;

/// Splits a 24-bit RF transfer into (register index, 18-bit data, is read).
#[inline]
pub fn decode_rf_transfer(transfer: u32) -> (u8, u32, bool) {
    (
        (transfer >> 18 & 0x1F) as u8,
        transfer & 0x3_FFFF,
        transfer & 1 << 23 != 0,
    )
}

/// Baseband and RF chip register files.
#[derive(Clone)]
pub struct Radio {
    bb_regs: [u8; 0x100],
    rf_regs: [u32; 0x20],
}

impl Radio {
    pub(super) fn new(settings: &WifiSettings) -> Self {
        // Read-only registers with nonzero reset values
        let mut bb_regs = [0; 0x100];
        bb_regs[0x00] = 0x6D;
        bb_regs[0x4D] = 0xBF;
        bb_regs[0x5D] = 0x01;
        bb_regs[0x64] = 0xFF;

        let mut radio = Radio {
            bb_regs,
            rf_regs: [0; 0x20],
        };
        for (index, &value) in settings.bb_init.iter().enumerate() {
            radio.write_bb(index as u8, value);
        }
        radio
    }

    #[inline]
    pub fn bb_reg(&self, index: u8) -> u8 {
        self.bb_regs[index as usize]
    }

    #[inline]
    pub fn rf_reg(&self, index: u8) -> u32 {
        self.rf_regs[index as usize & 0x1F]
    }

    /// Returns whether the register accepted the write.
    pub(super) fn write_bb(&mut self, index: u8, value: u8) -> bool {
        if bb_reg_writable(index) {
            self.bb_regs[index as usize] = value;
            true
        } else {
            false
        }
    }

    /// Performs a 24-bit write transfer.
    pub(super) fn write_rf(&mut self, transfer: u32) {
        let (index, data, _) = decode_rf_transfer(transfer);
        self.rf_regs[index as usize] = data;
    }

    pub(super) fn tune(&mut self, tuning: &ChannelTuning) {
        self.write_rf(tuning.rf[0]);
        self.write_rf(tuning.rf[1]);
        self.bb_regs[BB_CHANNEL_REG as usize] = tuning.bb;
    }
}
