//! Register addresses and layouts of the wireless controller, relative to `0x0480_0000`.

pub const W_ID: u16 = 0x000;
pub const W_MODE_RST: u16 = 0x004;
pub const W_MODE_WEP: u16 = 0x006;
pub const W_TXSTATCNT: u16 = 0x008;
pub const W_IF: u16 = 0x010;
pub const W_IE: u16 = 0x012;
pub const W_MACADDR_0: u16 = 0x018;
pub const W_MACADDR_1: u16 = 0x01A;
pub const W_MACADDR_2: u16 = 0x01C;
pub const W_BSSID_0: u16 = 0x020;
pub const W_BSSID_1: u16 = 0x022;
pub const W_BSSID_2: u16 = 0x024;
pub const W_AID_LOW: u16 = 0x028;
pub const W_AID_FULL: u16 = 0x02A;
pub const W_TX_RETRYLIMIT: u16 = 0x02C;
pub const W_RXCNT: u16 = 0x030;
pub const W_WEP_CNT: u16 = 0x032;
pub const W_POWER_US: u16 = 0x036;
pub const W_POWER_TX: u16 = 0x038;
pub const W_POWERSTATE: u16 = 0x03C;
pub const W_POWERFORCE: u16 = 0x040;
pub const W_RANDOM: u16 = 0x044;
pub const W_RXBUF_BEGIN: u16 = 0x050;
pub const W_RXBUF_END: u16 = 0x052;
pub const W_RXBUF_WRCSR: u16 = 0x054;
pub const W_RXBUF_WR_ADDR: u16 = 0x056;
pub const W_RXBUF_RD_ADDR: u16 = 0x058;
pub const W_RXBUF_READCSR: u16 = 0x05A;
pub const W_RXBUF_COUNT: u16 = 0x05C;
pub const W_RXBUF_RD_DATA: u16 = 0x060;
pub const W_RXBUF_GAP: u16 = 0x062;
pub const W_RXBUF_GAPDISP: u16 = 0x064;
pub const W_TXBUF_WR_ADDR: u16 = 0x068;
pub const W_TXBUF_COUNT: u16 = 0x06C;
pub const W_TXBUF_WR_DATA: u16 = 0x070;
pub const W_TXBUF_GAP: u16 = 0x074;
pub const W_TXBUF_GAPDISP: u16 = 0x076;
pub const W_TXBUF_BEACON: u16 = 0x080;
pub const W_TXBUF_TIM: u16 = 0x084;
pub const W_LISTENCOUNT: u16 = 0x088;
pub const W_BEACONINT: u16 = 0x08C;
pub const W_LISTENINT: u16 = 0x08E;
pub const W_TXBUF_CMD: u16 = 0x090;
pub const W_TXBUF_LOC1: u16 = 0x0A0;
pub const W_TXBUF_LOC2: u16 = 0x0A4;
pub const W_TXBUF_LOC3: u16 = 0x0A8;
pub const W_TXREQ_RESET: u16 = 0x0AC;
pub const W_TXREQ_SET: u16 = 0x0AE;
pub const W_TXREQ_READ: u16 = 0x0B0;
pub const W_TXBUSY: u16 = 0x0B6;
pub const W_TXSTAT: u16 = 0x0B8;
pub const W_PREAMBLE: u16 = 0x0BC;
pub const W_RXFILTER: u16 = 0x0D0;
pub const W_RXFILTER2: u16 = 0x0E0;
pub const W_US_COUNTCNT: u16 = 0x0E8;
pub const W_US_COMPARECNT: u16 = 0x0EA;
pub const W_US_COMPARE0: u16 = 0x0F0;
pub const W_US_COUNT0: u16 = 0x0F8;
pub const W_US_COUNT3: u16 = 0x0FE;
pub const W_PRE_BEACON: u16 = 0x110;
pub const W_CMD_COUNT: u16 = 0x118;
pub const W_BEACONCOUNT1: u16 = 0x11C;
pub const W_CONFIG_FIRST: u16 = 0x120;
pub const W_CONFIG_LAST: u16 = 0x154;
pub const W_BEACONCOUNT2: u16 = 0x134;
pub const W_BB_CNT: u16 = 0x158;
pub const W_BB_WRITE: u16 = 0x15A;
pub const W_BB_READ: u16 = 0x15C;
pub const W_BB_BUSY: u16 = 0x15E;
pub const W_BB_MODE: u16 = 0x160;
pub const W_BB_POWER: u16 = 0x168;
pub const W_RF_DATA2: u16 = 0x17C;
pub const W_RF_DATA1: u16 = 0x17E;
pub const W_RF_BUSY: u16 = 0x180;
pub const W_RF_CNT: u16 = 0x184;
pub const W_RF_PINS: u16 = 0x19C;
pub const W_TX_ERR_COUNT: u16 = 0x1D0;
pub const W_RX_COUNT: u16 = 0x1D4;
pub const W_RF_STATUS: u16 = 0x214;
pub const W_IF_SET: u16 = 0x21C;
pub const W_RXTX_ADDR: u16 = 0x268;

/// Registers that hold whatever is written to them, with the mask of implemented bits.
pub fn plain_mask(addr: u16) -> Option<u16> {
    Some(match addr {
        W_MODE_WEP => 0x007F,
        W_TXSTATCNT => 0xF000,
        W_IE => 0xFFFF,
        W_MACADDR_0..=W_MACADDR_2 | W_BSSID_0..=W_BSSID_2 => 0xFFFF,
        W_AID_LOW => 0x000F,
        W_AID_FULL => 0x07FF,
        W_TX_RETRYLIMIT => 0xFFFF,
        W_WEP_CNT => 0x8000,
        W_POWER_US => 0x0003,
        W_POWER_TX => 0x0007,
        W_RXBUF_BEGIN | W_RXBUF_END => 0xFFFF,
        W_RXBUF_WR_ADDR => 0x0FFF,
        W_RXBUF_RD_ADDR => 0x1FFE,
        W_RXBUF_READCSR => 0x0FFF,
        W_RXBUF_COUNT => 0x0FFF,
        W_RXBUF_GAP => 0x1FFE,
        W_RXBUF_GAPDISP => 0x0FFF,
        W_TXBUF_WR_ADDR => 0x1FFE,
        W_TXBUF_COUNT => 0x0FFF,
        W_TXBUF_GAP => 0x1FFE,
        W_TXBUF_GAPDISP => 0x0FFF,
        W_TXBUF_BEACON => 0x8FFF,
        W_TXBUF_TIM => 0x00FF,
        W_LISTENCOUNT => 0x00FF,
        W_BEACONINT => 0x03FF,
        W_LISTENINT => 0x00FF,
        W_TXBUF_CMD | W_TXBUF_LOC1 | W_TXBUF_LOC2 | W_TXBUF_LOC3 => 0xFFFF,
        W_PREAMBLE => 0x0007,
        W_RXFILTER => 0x1FFF,
        W_RXFILTER2 => 0x000F,
        W_US_COUNTCNT | W_US_COMPARECNT => 0x0001,
        W_US_COMPARE0..=W_US_COUNT3 => 0xFFFF,
        W_PRE_BEACON => 0xFFFF,
        W_CMD_COUNT => 0xFFFF,
        W_BEACONCOUNT1 => 0xFFFF,
        W_CONFIG_FIRST..=W_CONFIG_LAST => 0xFFFF,
        W_BB_MODE => 0x4100,
        W_BB_POWER => 0x800F,
        W_RF_DATA2 => 0x00FF,
        W_RF_CNT => 0x413F,
        W_TX_ERR_COUNT | W_RX_COUNT => 0x00FF,
        W_RXTX_ADDR => 0x0FFF,
        _ => return None,
    })
}

/// Registers only the hardware updates.
pub fn is_read_only(addr: u16) -> bool {
    matches!(
        addr,
        W_ID | W_RXBUF_WRCSR
            | W_TXREQ_READ
            | W_TXBUSY
            | W_TXSTAT
            | W_BEACONCOUNT2
            | W_BB_READ
            | W_BB_BUSY
            | W_RF_BUSY
            | W_RF_PINS
            | W_RF_STATUS
    )
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Irqs(pub u16): Debug {
        pub rx_complete: bool @ 0,
        pub tx_complete: bool @ 1,
        pub rx_event_inc: bool @ 2,
        pub tx_error_inc: bool @ 3,
        pub rx_event_overflow: bool @ 4,
        pub tx_error_overflow: bool @ 5,
        pub rx_start: bool @ 6,
        pub tx_start: bool @ 7,
        pub txbuf_count_end: bool @ 8,
        pub rxbuf_count_end: bool @ 9,
        pub rf_wakeup: bool @ 11,
        pub multiplay_cmd_done: bool @ 12,
        pub post_beacon: bool @ 13,
        pub beacon: bool @ 14,
        pub pre_beacon: bool @ 15,
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct ModeReset(pub u16): Debug {
        pub active: bool @ 0,
        pub reset_tx: bool @ 13,
        pub reset_rx: bool @ 14,
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct RxControl(pub u16): Debug {
        pub copy_wr_addr: bool @ 0,
        pub enabled: bool @ 15,
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct PowerForce(pub u16): Debug {
        pub power_down: bool @ 0,
        pub apply: bool @ 15,
    }
}

proc_bitfield::bitfield! {
    /// Value of `W_TXBUF_LOCx`, `W_TXBUF_CMD` and `W_TXBUF_BEACON`.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct TxBufLoc(pub u16): Debug {
        pub halfword_addr: u16 @ 0..=11,
        pub enabled: bool @ 15,
    }
}

impl TxBufLoc {
    /// Byte offset into WiFi RAM.
    #[inline]
    pub fn ram_offset(self) -> usize {
        (self.halfword_addr() as usize) << 1
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct BbControl(pub u16): Debug {
        pub index: u8 @ 0..=7,
        pub direction: u8 @ 12..=15,
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct RfData2(pub u16): Debug {
        pub data_hi: u8 @ 0..=1,
        pub index: u8 @ 2..=6,
        pub read: bool @ 7,
    }
}

bitflags::bitflags! {
    /// Transmit slots, as laid out in `W_TXREQ_*` and `W_TXBUSY`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TxSlots: u16 {
        const LOC1 = 1 << 0;
        const CMD = 1 << 1;
        const LOC2 = 1 << 2;
        const LOC3 = 1 << 3;
        const BEACON = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxSlot {
    Loc1,
    Cmd,
    Loc2,
    Loc3,
    Beacon,
}

impl TxSlot {
    /// Slots software can request with `W_TXREQ_SET`, in priority order.
    pub const REQUESTABLE: [TxSlot; 4] = [TxSlot::Cmd, TxSlot::Loc3, TxSlot::Loc2, TxSlot::Loc1];

    pub fn flag(self) -> TxSlots {
        match self {
            TxSlot::Loc1 => TxSlots::LOC1,
            TxSlot::Cmd => TxSlots::CMD,
            TxSlot::Loc2 => TxSlots::LOC2,
            TxSlot::Loc3 => TxSlots::LOC3,
            TxSlot::Beacon => TxSlots::BEACON,
        }
    }

    pub fn loc_reg(self) -> u16 {
        match self {
            TxSlot::Loc1 => W_TXBUF_LOC1,
            TxSlot::Cmd => W_TXBUF_CMD,
            TxSlot::Loc2 => W_TXBUF_LOC2,
            TxSlot::Loc3 => W_TXBUF_LOC3,
            TxSlot::Beacon => W_TXBUF_BEACON,
        }
    }

    /// Value of bits 8-11 of `W_TXSTAT` after this slot finishes.
    pub fn stat_code(self) -> u16 {
        match self {
            TxSlot::Loc1 => 0,
            TxSlot::Cmd => 1,
            TxSlot::Loc2 => 2,
            TxSlot::Loc3 => 3,
            TxSlot::Beacon => 4,
        }
    }
}

/// Baseband registers software is allowed to write to.
pub fn bb_reg_writable(index: u8) -> bool {
    matches!(
        index,
        0x01..=0x0C
            | 0x13..=0x15
            | 0x1B..=0x26
            | 0x28..=0x4C
            | 0x4E..=0x5C
            | 0x62
            | 0x63
            | 0x65
            | 0x67
            | 0x68
    )
}
