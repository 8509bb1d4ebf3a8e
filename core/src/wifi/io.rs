use super::{regs::*, WiFi, RAM_SIZE};

pub trait AccessType {
    const IS_DEBUG: bool;
}

/// An access made by the emulated CPU, with all of the hardware side effects.
pub struct CpuAccess;

impl AccessType for CpuAccess {
    const IS_DEBUG: bool = false;
}

/// An access made by a debugger; reads never change any state.
pub struct DebugAccess;

impl AccessType for DebugAccess {
    const IS_DEBUG: bool = true;
}

impl WiFi {
    pub(super) fn peek_reg(&self, addr: u16) -> u16 {
        match addr {
            W_ID => self.chip_id,
            W_RANDOM => self.random,
            W_RXBUF_RD_DATA => self.ram_16(self.reg(W_RXBUF_RD_ADDR) as usize),
            W_US_COUNT0..=W_US_COUNT3 => (self.us_count >> ((addr - W_US_COUNT0) << 3)) as u16,
            W_BB_BUSY | W_RF_BUSY => 0,
            _ => self.reg(addr),
        }
    }

    pub(super) fn advance_random(&mut self) {
        self.random = (self.random & 1) ^ ((self.random & 0x3FF) << 1 | self.random >> 10);
    }

    fn read_rx_data(&mut self) {
        let begin = (self.reg(W_RXBUF_BEGIN) & 0x1FFE) as usize;
        let end = (self.reg(W_RXBUF_END) & 0x1FFE) as usize;
        let mut rd_addr = (self.reg(W_RXBUF_RD_ADDR) & 0x1FFE) as usize + 2;
        if rd_addr == (self.reg(W_RXBUF_GAP) & 0x1FFE) as usize {
            rd_addr += (self.reg(W_RXBUF_GAPDISP) as usize & 0xFFF) << 1;
        }
        if end > begin && rd_addr >= end {
            rd_addr = rd_addr - end + begin;
        }
        self.set_reg(W_RXBUF_RD_ADDR, (rd_addr & 0x1FFE) as u16);

        let count = self.reg(W_RXBUF_COUNT);
        if count != 0 {
            self.set_reg(W_RXBUF_COUNT, count - 1);
            if count == 1 {
                self.raise_irqs(|irqs| irqs.with_rxbuf_count_end(true));
            }
        }
    }

    pub(super) fn read_reg<A: AccessType>(&mut self, addr: u16) -> u16 {
        let value = self.peek_reg(addr);
        if !A::IS_DEBUG {
            match addr {
                W_RXBUF_RD_DATA => self.read_rx_data(),
                W_RANDOM => self.advance_random(),
                _ => {}
            }
        }
        value
    }

    fn ignore_write(&mut self, addr: u16, value: u16) {
        self.stats.ignored_writes += 1;
        #[cfg(feature = "log")]
        slog::debug!(
            self.logger,
            "Ignoring write to {} register {:#05X}: {:#06X}",
            if is_read_only(addr) { "read-only" } else { "unknown" },
            addr,
            value
        );
        #[cfg(not(feature = "log"))]
        let _ = (addr, value);
    }

    fn write_mode_rst(&mut self, value: u16) {
        let prev = ModeReset(self.reg(W_MODE_RST));
        let new = ModeReset(value);
        if new.active() != prev.active() {
            if new.active() {
                self.set_reg(W_RF_STATUS, 9);
                self.set_reg(W_RF_PINS, 0x46);
            } else {
                self.set_reg(W_RF_STATUS, 0);
                self.set_reg(W_RF_PINS, 0x04);
            }
            self.backend_reset_pending = true;
            #[cfg(feature = "log")]
            slog::debug!(
                self.logger,
                "MAC {}",
                if new.active() { "enabled" } else { "disabled" }
            );
        }
        if new.reset_tx() {
            self.set_reg(W_TXREQ_READ, 0);
            self.set_reg(W_TXBUSY, 0);
            self.set_reg(W_TXSTAT, 0);
            self.queued_slots = TxSlots::empty();
            self.abort_slot_tx();
        }
        if new.reset_rx() {
            let begin = (self.reg(W_RXBUF_BEGIN) & 0x1FFE) >> 1;
            self.set_reg(W_RXBUF_WRCSR, begin);
            self.set_reg(W_RXBUF_READCSR, begin);
        }
        self.set_reg(
            W_MODE_RST,
            new.with_reset_tx(false).with_reset_rx(false).0,
        );
    }

    fn write_power_state(&mut self, value: u16) {
        let powered_down = self.reg(W_POWERSTATE) & 1 << 9 != 0;
        // Bit 1 requests a wakeup
        if value & 2 != 0 && powered_down {
            self.set_reg(W_POWERSTATE, value & 3);
            self.raise_irqs(|irqs| irqs.with_rf_wakeup(true));
            self.backend_reset_pending = true;
        } else {
            self.set_reg(
                W_POWERSTATE,
                (self.reg(W_POWERSTATE) & 0x0200) | (value & 3),
            );
        }
    }

    fn write_power_force(&mut self, value: u16) {
        let value = PowerForce(value & 0x8001);
        self.set_reg(W_POWERFORCE, value.0);
        if !value.apply() {
            return;
        }
        let state = self.reg(W_POWERSTATE);
        let new_state = if value.power_down() {
            state | 0x0200
        } else {
            state & !0x0200
        };
        if new_state != state {
            self.set_reg(W_POWERSTATE, new_state);
            self.backend_reset_pending = true;
        }
    }

    fn write_tx_data(&mut self, value: u16) {
        self.set_reg(W_TXBUF_WR_DATA, value);
        let wr_addr = (self.reg(W_TXBUF_WR_ADDR) & 0x1FFE) as usize;
        self.set_ram_16(wr_addr, value);

        let mut next = wr_addr + 2;
        if next == (self.reg(W_TXBUF_GAP) & 0x1FFE) as usize {
            next += (self.reg(W_TXBUF_GAPDISP) as usize & 0xFFF) << 1;
        }
        self.set_reg(W_TXBUF_WR_ADDR, (next & (RAM_SIZE - 2)) as u16);

        let count = self.reg(W_TXBUF_COUNT);
        if count != 0 {
            self.set_reg(W_TXBUF_COUNT, count - 1);
            if count == 1 {
                self.raise_irqs(|irqs| irqs.with_txbuf_count_end(true));
            }
        }
    }

    fn write_bb_cnt(&mut self, value: u16) {
        self.set_reg(W_BB_CNT, value);
        let control = BbControl(value);
        let index = control.index();
        match control.direction() {
            5 => {
                let data = self.reg(W_BB_WRITE) as u8;
                if !self.radio.write_bb(index, data) {
                    #[cfg(feature = "log")]
                    slog::debug!(
                        self.logger,
                        "Ignoring write to read-only BB register {:#04X}: {:#04X}",
                        index,
                        data
                    );
                }
            }
            6 => self.set_reg(W_BB_READ, self.radio.bb_reg(index) as u16),
            _direction => {
                #[cfg(feature = "log")]
                slog::debug!(self.logger, "Unknown BB transfer direction {}", _direction);
            }
        }
    }

    pub(super) fn write_reg(&mut self, addr: u16, value: u16) {
        match addr {
            W_MODE_RST => self.write_mode_rst(value),

            W_IF => self.set_reg(W_IF, self.reg(W_IF) & !value),

            W_IF_SET => self.raise_irqs(|irqs| Irqs(irqs.0 | (value & 0xFBFF))),

            W_RXCNT => {
                let control = RxControl(value & 0xFF8F);
                if control.copy_wr_addr() {
                    self.set_reg(W_RXBUF_WRCSR, self.reg(W_RXBUF_WR_ADDR) & 0x0FFF);
                }
                self.set_reg(W_RXCNT, control.with_copy_wr_addr(false).0);
            }

            W_POWERSTATE => self.write_power_state(value),

            W_POWERFORCE => self.write_power_force(value),

            W_TXBUF_WR_DATA => self.write_tx_data(value),

            W_TXREQ_RESET => self.set_reg(W_TXREQ_READ, self.reg(W_TXREQ_READ) & !(value & 0xF)),

            W_TXREQ_SET => self.set_reg(W_TXREQ_READ, self.reg(W_TXREQ_READ) | (value & 0xF)),

            W_BB_CNT => self.write_bb_cnt(value),

            W_BB_WRITE => self.set_reg(W_BB_WRITE, value),

            W_RF_DATA1 => {
                self.set_reg(W_RF_DATA1, value);
                let data2 = RfData2(self.reg(W_RF_DATA2));
                #[cfg(feature = "log")]
                slog::trace!(
                    self.logger,
                    "RF {} register {}",
                    if data2.read() { "read from" } else { "write to" },
                    data2.index()
                );
                self.rf_transfer(u32::from(data2.0 & 0xFF) << 16 | u32::from(value));
            }

            W_US_COUNT0..=W_US_COUNT3 => {
                let shift = (addr - W_US_COUNT0) << 3;
                self.us_count =
                    (self.us_count & !(0xFFFF << shift)) | u64::from(value) << shift;
            }

            _ if is_read_only(addr) => self.ignore_write(addr, value),

            _ => match plain_mask(addr) {
                Some(mask) => {
                    if value & !mask != 0 {
                        #[cfg(feature = "log")]
                        slog::debug!(
                            self.logger,
                            "Ignoring reserved bits written to register {:#05X}: {:#06X}",
                            addr,
                            value & !mask
                        );
                    }
                    self.set_reg(addr, value & mask);
                }
                None => self.ignore_write(addr, value),
            },
        }
    }

    pub fn read_8<A: AccessType>(&mut self, addr: u16) -> u8 {
        match addr >> 13 & 3 {
            0 | 3 => (self.read_reg::<A>(addr & 0xFFE) >> ((addr & 1) << 3)) as u8,
            2 => self.ram[(addr as usize) & (RAM_SIZE - 1)],
            _ => 0,
        }
    }

    pub fn read_16<A: AccessType>(&mut self, addr: u16) -> u16 {
        match addr >> 13 & 3 {
            0 | 3 => self.read_reg::<A>(addr & 0xFFE),
            2 => self.ram_16(addr as usize),
            _ => 0,
        }
    }

    pub fn read_32<A: AccessType>(&mut self, addr: u16) -> u32 {
        match addr >> 13 & 3 {
            0 | 3 => {
                let addr = addr & 0xFFC;
                self.read_reg::<A>(addr) as u32 | (self.read_reg::<A>(addr | 2) as u32) << 16
            }
            2 => {
                let addr = addr as usize & (RAM_SIZE - 4);
                self.ram_16(addr) as u32 | (self.ram_16(addr | 2) as u32) << 16
            }
            _ => 0,
        }
    }

    pub fn write_8<A: AccessType>(&mut self, addr: u16, value: u8) {
        match addr >> 13 & 3 {
            0 | 3 => {
                // The controller only latches 16-bit bus cycles
                self.stats.ignored_writes += 1;
                #[cfg(feature = "log")]
                slog::debug!(
                    self.logger,
                    "Ignoring 8-bit write to register {:#05X}: {:#04X}",
                    addr & 0xFFF,
                    value
                );
            }
            2 => self.ram[(addr as usize) & (RAM_SIZE - 1)] = value,
            _ => {}
        }
    }

    pub fn write_16<A: AccessType>(&mut self, addr: u16, value: u16) {
        match addr >> 13 & 3 {
            0 | 3 => self.write_reg(addr & 0xFFE, value),
            2 => self.set_ram_16(addr as usize, value),
            _ => {}
        }
    }

    pub fn write_32<A: AccessType>(&mut self, addr: u16, value: u32) {
        match addr >> 13 & 3 {
            0 | 3 => {
                let addr = addr & 0xFFC;
                self.write_reg(addr, value as u16);
                self.write_reg(addr | 2, (value >> 16) as u16);
            }
            2 => {
                let addr = addr as usize & (RAM_SIZE - 4);
                self.set_ram_16(addr, value as u16);
                self.set_ram_16(addr | 2, (value >> 16) as u16);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{firmware::WifiSettings, wifi::BackendKind, Config};

    fn wifi() -> WiFi {
        WiFi::new(
            WifiSettings::default(),
            &Config {
                backend: BackendKind::None,
                ..Config::default()
            },
            #[cfg(feature = "log")]
            slog::Logger::root(slog::Discard, slog::o!()),
        )
    }

    #[test]
    fn plain_registers_round_trip() {
        let mut wifi = wifi();
        for (addr, value) in [
            (W_IE, 0xFFFF),
            (W_BSSID_1, 0x1234),
            (W_TXBUF_LOC1, 0x8123),
            (W_BEACONINT, 0x0064),
            (0x120, 0xABCD),
        ] {
            wifi.write_register(addr, value);
            assert_eq!(wifi.read_register(addr), value, "register {addr:#05X}");
        }
        wifi.write_register(W_AID_LOW, 0xFFFF);
        assert_eq!(wifi.read_register(W_AID_LOW), 0x000F);
        assert_eq!(wifi.stats().ignored_writes, 0);
    }

    #[test]
    fn ignored_writes() {
        let mut wifi = wifi();
        let id = wifi.read_register(W_ID);
        wifi.write_register(W_ID, 0);
        wifi.write_register(W_TXSTAT, 0x0401);
        wifi.write_register(0xFFE, 1);
        wifi.write_8::<CpuAccess>(W_IE, 0xFF);
        assert_eq!(wifi.read_register(W_ID), id);
        assert_eq!(wifi.read_register(W_TXSTAT), 0);
        assert_eq!(wifi.read_register(W_IE), 0);
        assert_eq!(wifi.stats().ignored_writes, 4);
    }

    #[test]
    fn interrupt_acknowledge() {
        let mut wifi = wifi();
        wifi.write_register(W_IF_SET, 0x0003);
        assert_eq!(wifi.read_register(W_IF), 0x0003);
        assert!(!wifi.irq_pending());
        wifi.write_register(W_IE, 0x0002);
        assert!(wifi.irq_pending());
        wifi.write_register(W_IF, 0x0002);
        assert_eq!(wifi.read_register(W_IF), 0x0001);
        assert!(!wifi.irq_pending());
    }

    #[test]
    fn baseband_access() {
        let mut wifi = wifi();
        wifi.write_register(W_BB_WRITE, 0x5A);
        wifi.write_register(W_BB_CNT, 0x5000 | 0x02);
        wifi.write_register(W_BB_CNT, 0x6000 | 0x02);
        assert_eq!(wifi.read_register(W_BB_READ), 0x5A);

        // Not writable
        wifi.write_register(W_BB_CNT, 0x5000);
        wifi.write_register(W_BB_CNT, 0x6000);
        assert_eq!(wifi.read_register(W_BB_READ), 0x6D);
    }

    #[test]
    fn rf_channel_selection() {
        let mut wifi = wifi();
        let tuning = wifi.settings().channel_tuning(crate::wifi::Channel::new(9).unwrap());
        wifi.write_register(W_RF_DATA2, (tuning.rf[0] >> 16) as u16);
        wifi.write_register(W_RF_DATA1, tuning.rf[0] as u16);
        assert_eq!(wifi.channel().get(), 9);
        assert_eq!(wifi.rf_reg(6), tuning.rf[1] & 0x3_FFFF);
        assert_eq!(wifi.bb_reg(0x1E), tuning.bb);

        // Read back RF[5]
        wifi.write_register(W_RF_DATA2, 0x80 | 5 << 2);
        wifi.write_register(W_RF_DATA1, 0);
        let value = u32::from(wifi.read_register(W_RF_DATA2) & 3) << 16
            | u32::from(wifi.read_register(W_RF_DATA1));
        assert_eq!(value, tuning.rf[0] & 0x3_FFFF);
    }

    #[test]
    fn tx_buffer_writes() {
        let mut wifi = wifi();
        wifi.write_register(W_TXBUF_WR_ADDR, 0x100);
        wifi.write_register(W_TXBUF_GAP, 0x104);
        wifi.write_register(W_TXBUF_GAPDISP, 2);
        wifi.write_register(W_TXBUF_COUNT, 3);
        for value in [0x1111, 0x2222, 0x3333] {
            wifi.write_register(W_TXBUF_WR_DATA, value);
        }
        assert_eq!(wifi.read_16::<DebugAccess>(0x4100), 0x1111);
        assert_eq!(wifi.read_16::<DebugAccess>(0x4102), 0x2222);
        assert_eq!(wifi.read_16::<DebugAccess>(0x4108), 0x3333);
        assert_eq!(wifi.read_register(W_TXBUF_WR_ADDR), 0x10A);
        assert_eq!(wifi.read_register(W_IF) & 1 << 8, 1 << 8);
    }

    #[test]
    fn rx_buffer_reads() {
        let mut wifi = wifi();
        wifi.write_register(W_RXBUF_BEGIN, 0x4000);
        wifi.write_register(W_RXBUF_END, 0x4008);
        wifi.write_32::<CpuAccess>(0x4004, 0xBBBB_AAAA);
        wifi.write_register(W_RXBUF_RD_ADDR, 0x0004);
        wifi.write_register(W_RXBUF_COUNT, 2);

        assert_eq!(wifi.read_16::<DebugAccess>(W_RXBUF_RD_DATA), 0xAAAA);
        assert_eq!(wifi.read_16::<DebugAccess>(W_RXBUF_RD_DATA), 0xAAAA);
        assert_eq!(wifi.read_16::<CpuAccess>(W_RXBUF_RD_DATA), 0xAAAA);
        assert_eq!(wifi.read_16::<CpuAccess>(W_RXBUF_RD_DATA), 0xBBBB);
        // Wrapped around to the start of the ring
        assert_eq!(wifi.read_register(W_RXBUF_RD_ADDR), 0x0000);
        assert_eq!(wifi.read_register(W_IF) & 1 << 9, 1 << 9);
    }

    #[test]
    fn random_only_advances_on_cpu_reads() {
        let mut wifi = wifi();
        let first = wifi.read_16::<DebugAccess>(W_RANDOM);
        assert_eq!(wifi.read_16::<DebugAccess>(W_RANDOM), first);
        assert_eq!(wifi.read_16::<CpuAccess>(W_RANDOM), first);
        assert_ne!(wifi.read_16::<CpuAccess>(W_RANDOM), first);
    }

    #[test]
    fn us_counter_halves() {
        let mut wifi = wifi();
        wifi.write_32::<CpuAccess>(W_US_COUNT0, 0x89AB_CDEF);
        wifi.write_16::<CpuAccess>(W_US_COUNT3, 0x0123);
        assert_eq!(wifi.read_32::<CpuAccess>(W_US_COUNT0), 0x89AB_CDEF);
        assert_eq!(wifi.read_16::<CpuAccess>(W_US_COUNT3), 0x0123);
    }

    #[test]
    fn mirrors_and_unmapped_region() {
        let mut wifi = wifi();
        wifi.write_16::<CpuAccess>(0x6000 | W_IE, 0x0042);
        assert_eq!(wifi.read_16::<CpuAccess>(W_IE), 0x0042);
        assert_eq!(wifi.read_8::<CpuAccess>(W_IE), 0x42);
        assert_eq!(wifi.read_8::<CpuAccess>(W_IE | 1), 0);
        assert_eq!(wifi.read_16::<CpuAccess>(0x2000 | W_IE), 0);
        wifi.write_8::<CpuAccess>(0x5FFF, 0x77);
        assert_eq!(wifi.ram[0x1FFF], 0x77);
    }

    #[test]
    fn power_transitions() {
        let mut wifi = wifi();
        wifi.write_register(W_MODE_RST, 1);
        assert!(!wifi.hardware_active());
        wifi.write_register(W_POWERSTATE, 2);
        assert!(wifi.hardware_active());
        assert_eq!(wifi.read_register(W_IF) & 1 << 11, 1 << 11);
        assert_eq!(wifi.read_register(W_RF_PINS), 0x46);

        wifi.write_register(W_POWERFORCE, 0x8001);
        assert!(!wifi.hardware_active());
        wifi.write_register(W_POWERFORCE, 0x8000);
        assert!(wifi.hardware_active());
    }
}
