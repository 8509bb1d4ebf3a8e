use core::fmt;

pub const FCS_LEN: usize = 4;
pub const TX_HEADER_LEN: usize = 12;
pub const RX_HEADER_LEN: usize = 12;
pub const MAC_HEADER_LEN: usize = 24;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: Self = MacAddr([0xFF; 6]);

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        Some(MacAddr(bytes.get(..6)?.try_into().ok()?))
    }

    #[inline]
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Group addressed (broadcast included).
    #[inline]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 1 != 0
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct FrameControl(pub u16): Debug {
        pub version: u8 @ 0..=1,
        pub ty: u8 @ 2..=3,
        pub subtype: u8 @ 4..=7,
        pub to_ds: bool @ 8,
        pub from_ds: bool @ 9,
        pub more_fragments: bool @ 10,
        pub retry: bool @ 11,
        pub power_mgmt: bool @ 12,
        pub more_data: bool @ 13,
        pub protected: bool @ 14,
        pub order: bool @ 15,
    }
}

pub mod ty {
    pub const MANAGEMENT: u8 = 0;
    pub const CONTROL: u8 = 1;
    pub const DATA: u8 = 2;
}

pub mod mgmt {
    pub const ASSOC_REQ: u8 = 0;
    pub const ASSOC_RESP: u8 = 1;
    pub const PROBE_REQ: u8 = 4;
    pub const PROBE_RESP: u8 = 5;
    pub const BEACON: u8 = 8;
    pub const DISASSOC: u8 = 10;
    pub const AUTH: u8 = 11;
    pub const DEAUTH: u8 = 12;
}

pub mod element {
    pub const SSID: u8 = 0;
    pub const SUPPORTED_RATES: u8 = 1;
    pub const DS_PARAMS: u8 = 3;
    pub const TIM: u8 = 5;
}

/// An 802.11 frame as it travels between the MAC and a backend: MAC header and body, without
/// the FCS.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    #[inline]
    pub fn new(bytes: Vec<u8>) -> Self {
        Frame(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn control(&self) -> FrameControl {
        match self.0.get(..2) {
            Some(&[lo, hi]) => FrameControl(u16::from_le_bytes([lo, hi])),
            _ => FrameControl(0),
        }
    }

    #[inline]
    fn addr_at(&self, pos: usize) -> Option<MacAddr> {
        MacAddr::from_slice(self.0.get(pos..)?)
    }

    /// Receiver address.
    #[inline]
    pub fn addr1(&self) -> Option<MacAddr> {
        self.addr_at(4)
    }

    /// Transmitter address (absent in ACK/CTS frames).
    #[inline]
    pub fn addr2(&self) -> Option<MacAddr> {
        self.addr_at(10)
    }

    /// BSSID for management frames.
    #[inline]
    pub fn addr3(&self) -> Option<MacAddr> {
        self.addr_at(16)
    }

    pub fn is_mgmt(&self, subtype: u8) -> bool {
        let fc = self.control();
        fc.ty() == ty::MANAGEMENT && fc.subtype() == subtype
    }

    /// The management frame body, after the 24-byte header.
    pub fn body(&self) -> &[u8] {
        self.0.get(MAC_HEADER_LEN..).unwrap_or(&[])
    }

    /// Finds an information element in a management frame body starting at `offset`.
    pub fn element(&self, offset: usize, id: u8) -> Option<&[u8]> {
        let mut elements = self.body().get(offset..)?;
        while let [elem_id, len, rest @ ..] = elements {
            let len = *len as usize;
            let data = rest.get(..len)?;
            if *elem_id == id {
                return Some(data);
            }
            elements = &rest[len..];
        }
        None
    }

    /// Frame class as reported in bits 0-3 of the RX header flags.
    pub fn rx_class(&self) -> u16 {
        let fc = self.control();
        match fc.ty() {
            ty::MANAGEMENT if fc.subtype() == mgmt::BEACON => 1,
            ty::MANAGEMENT => 0,
            ty::CONTROL => 5,
            _ => 8,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fc = self.control();
        f.debug_struct("Frame")
            .field("ty", &fc.ty())
            .field("subtype", &fc.subtype())
            .field("addr1", &self.addr1())
            .field("addr2", &self.addr2())
            .field("len", &self.0.len())
            .finish()
    }
}

pub struct MgmtFrameBuilder(Vec<u8>);

impl MgmtFrameBuilder {
    pub fn new(subtype: u8, dst: MacAddr, src: MacAddr, bssid: MacAddr, seq: u16) -> Self {
        let mut bytes = Vec::with_capacity(128);
        let fc = FrameControl(0)
            .with_ty(ty::MANAGEMENT)
            .with_subtype(subtype);
        bytes.extend_from_slice(&fc.0.to_le_bytes());
        bytes.extend_from_slice(&0_u16.to_le_bytes());
        bytes.extend_from_slice(&dst.0);
        bytes.extend_from_slice(&src.0);
        bytes.extend_from_slice(&bssid.0);
        bytes.extend_from_slice(&(seq << 4).to_le_bytes());
        MgmtFrameBuilder(bytes)
    }

    #[must_use]
    pub fn u16(mut self, value: u16) -> Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    #[must_use]
    pub fn u64(mut self, value: u64) -> Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    #[must_use]
    pub fn element(mut self, id: u8, data: &[u8]) -> Self {
        self.0.push(id);
        self.0.push(data.len() as u8);
        self.0.extend_from_slice(data);
        self
    }

    pub fn build(self) -> Frame {
        Frame(self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rate {
    Mbps1,
    Mbps2,
}

impl Rate {
    #[inline]
    pub fn from_raw(raw: u8) -> Self {
        if raw == 0x14 {
            Rate::Mbps2
        } else {
            Rate::Mbps1
        }
    }

    #[inline]
    pub fn raw(self) -> u16 {
        match self {
            Rate::Mbps1 => 0x0A,
            Rate::Mbps2 => 0x14,
        }
    }

    #[inline]
    pub fn mbps(self) -> u32 {
        match self {
            Rate::Mbps1 => 1,
            Rate::Mbps2 => 2,
        }
    }
}

/// The 12-byte header software places in front of a frame in a TX slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxHeader {
    pub rate: Rate,
    /// Length of the frame including its FCS.
    pub len: u16,
}

impl TxHeader {
    pub fn parse(bytes: &[u8; TX_HEADER_LEN]) -> Self {
        TxHeader {
            rate: Rate::from_raw(bytes[8]),
            len: u16::from_le_bytes([bytes[0xA], bytes[0xB]]),
        }
    }

    /// Frame length as sent to a backend.
    #[inline]
    pub fn frame_len(&self) -> usize {
        (self.len as usize).saturating_sub(FCS_LEN)
    }
}

/// Builds the 12-byte header the hardware writes in front of each received frame.
pub fn rx_header(frame: &Frame, rate: Rate, bssid_match: bool) -> [u8; RX_HEADER_LEN] {
    let flags = frame.rx_class() | (bssid_match as u16) << 15;
    let mut header = [0; RX_HEADER_LEN];
    header[0..2].copy_from_slice(&flags.to_le_bytes());
    header[2..4].copy_from_slice(&0x0040_u16.to_le_bytes());
    header[6..8].copy_from_slice(&rate.raw().to_le_bytes());
    header[8..10].copy_from_slice(&(frame.len() as u16).to_le_bytes());
    // Constant signal strength
    header[0xA] = 0xFF;
    header[0xB] = 0x00;
    header
}
