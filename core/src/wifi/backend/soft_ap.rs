use super::{Backend, Inbound, InitError, SendError};
use crate::{
    config::SoftApConfig,
    firmware::WifiSettings,
    wifi::{
        frame::{element, mgmt, ty, MgmtFrameBuilder},
        Channel, Frame, MacAddr,
    },
};
use std::collections::VecDeque;

pub const BSSID: MacAddr = MacAddr([0x00, 0xF0, 0x1A, 0x2B, 0x3C, 0x4D]);
pub const DEFAULT_SSID: &[u8] = b"SoftAP";

// ESS, short preamble
const CAPABILITIES: u16 = 0x0021;
// 1 and 2 Mbit/s, both basic
const SUPPORTED_RATES: [u8; 2] = [0x82, 0x84];
const ASSOC_ID: u16 = 0xC001;

const AUTH_OPEN_SYSTEM: u16 = 0;
const STATUS_SUCCESS: u16 = 0;

/// An access point living entirely inside the emulator: it beacons, answers scans and lets the
/// console authenticate and associate, but has no upstream network.
pub struct SoftAp {
    #[cfg(feature = "log")]
    logger: slog::Logger,
    ssid: Vec<u8>,
    channel: Channel,
    beacon_interval_ms: u32,
    initialized: bool,
    ms_counter: u64,
    seq: u16,
    pending: VecDeque<Frame>,
    stations: Vec<MacAddr>,
    discarded_data: u64,
}

impl SoftAp {
    pub fn new(
        config: &SoftApConfig,
        settings: &WifiSettings,
        profile_index: usize,
        #[cfg(feature = "log")] logger: slog::Logger,
    ) -> Result<Self, InitError> {
        let channel =
            Channel::new(config.channel).ok_or(InitError::InvalidConfig("channel out of range"))?;
        if config.beacon_interval_ms == 0 {
            return Err(InitError::InvalidConfig("beacon interval must be nonzero"));
        }
        let profile = settings
            .ap_profiles
            .get(profile_index)
            .ok_or(InitError::InvalidConfig("access point profile index out of range"))?;
        let ssid = if profile.is_configured() && !profile.ssid().is_empty() {
            profile.ssid().to_vec()
        } else {
            DEFAULT_SSID.to_vec()
        };

        Ok(SoftAp {
            #[cfg(feature = "log")]
            logger,
            ssid,
            channel,
            beacon_interval_ms: config.beacon_interval_ms,
            initialized: false,
            ms_counter: 0,
            seq: 0,
            pending: VecDeque::new(),
            stations: Vec::new(),
            discarded_data: 0,
        })
    }

    #[inline]
    pub fn ssid(&self) -> &[u8] {
        &self.ssid
    }

    #[inline]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    #[inline]
    pub fn stations(&self) -> &[MacAddr] {
        &self.stations
    }

    /// Data frames received from the console, which go nowhere.
    #[inline]
    pub fn discarded_data(&self) -> u64 {
        self.discarded_data
    }

    fn next_seq(&mut self) -> u16 {
        let seq = self.seq;
        self.seq = (self.seq + 1) & 0xFFF;
        seq
    }

    fn timestamp(&self) -> u64 {
        self.ms_counter * 1000
    }

    fn with_network_info(&self, builder: MgmtFrameBuilder) -> MgmtFrameBuilder {
        builder
            .u64(self.timestamp())
            .u16(self.beacon_interval_ms as u16)
            .u16(CAPABILITIES)
            .element(element::SSID, &self.ssid)
            .element(element::SUPPORTED_RATES, &SUPPORTED_RATES)
            .element(element::DS_PARAMS, &[self.channel.get()])
    }

    fn beacon(&mut self) -> Frame {
        let seq = self.next_seq();
        self.with_network_info(MgmtFrameBuilder::new(
            mgmt::BEACON,
            MacAddr::BROADCAST,
            BSSID,
            BSSID,
            seq,
        ))
        // DTIM count, DTIM period, bitmap control, empty virtual bitmap
        .element(element::TIM, &[0, 1, 0, 0])
        .build()
    }

    fn respond(&mut self, subtype: u8, dst: MacAddr) -> MgmtFrameBuilder {
        let seq = self.next_seq();
        MgmtFrameBuilder::new(subtype, dst, BSSID, BSSID, seq)
    }

    fn handle_mgmt(&mut self, frame: &Frame, src: MacAddr) {
        let subtype = frame.control().subtype();
        match subtype {
            mgmt::PROBE_REQ => {
                let matches = match frame.element(0, element::SSID) {
                    Some(ssid) => ssid.is_empty() || ssid == self.ssid.as_slice(),
                    None => true,
                };
                if matches {
                    let builder = self.respond(mgmt::PROBE_RESP, src);
                    let response = self.with_network_info(builder).build();
                    self.pending.push_back(response);
                }
            }

            mgmt::AUTH => {
                let body = frame.body();
                if body.len() < 4 {
                    return;
                }
                let algorithm = u16::from_le_bytes([body[0], body[1]]);
                let seq = u16::from_le_bytes([body[2], body[3]]);
                if algorithm != AUTH_OPEN_SYSTEM || seq != 1 {
                    #[cfg(feature = "log")]
                    slog::debug!(
                        self.logger,
                        "Ignoring authentication request (algorithm {}, seq {})",
                        algorithm,
                        seq
                    );
                    return;
                }
                let response = self
                    .respond(mgmt::AUTH, src)
                    .u16(AUTH_OPEN_SYSTEM)
                    .u16(2)
                    .u16(STATUS_SUCCESS)
                    .build();
                self.pending.push_back(response);
            }

            mgmt::ASSOC_REQ => {
                let response = self
                    .respond(mgmt::ASSOC_RESP, src)
                    .u16(CAPABILITIES)
                    .u16(STATUS_SUCCESS)
                    .u16(ASSOC_ID)
                    .element(element::SUPPORTED_RATES, &SUPPORTED_RATES)
                    .build();
                self.pending.push_back(response);
                if !self.stations.contains(&src) {
                    #[cfg(feature = "log")]
                    slog::info!(self.logger, "{} associated", src);
                    self.stations.push(src);
                }
            }

            mgmt::DEAUTH | mgmt::DISASSOC => {
                if let Some(i) = self.stations.iter().position(|&station| station == src) {
                    #[cfg(feature = "log")]
                    slog::info!(self.logger, "{} left", src);
                    self.stations.swap_remove(i);
                }
            }

            _ => {
                #[cfg(feature = "log")]
                slog::trace!(self.logger, "Unhandled management frame subtype {}", subtype);
            }
        }
    }
}

impl Backend for SoftAp {
    fn name(&self) -> &'static str {
        "soft-ap"
    }

    fn init(&mut self) -> Result<(), InitError> {
        self.initialized = true;
        #[cfg(feature = "log")]
        slog::info!(
            self.logger,
            "Access point \"{}\" up on channel {}",
            String::from_utf8_lossy(&self.ssid),
            self.channel.get()
        );
        Ok(())
    }

    fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        self.initialized = false;
        self.pending.clear();
        self.stations.clear();
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.stations.clear();
        self.ms_counter = 0;
        self.seq = 0;
    }

    fn send_packet(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        if !self.initialized {
            return Err(SendError::NotInitialized);
        }
        let frame = Frame::new(bytes.to_vec());
        let (Some(dst), Some(src)) = (frame.addr1(), frame.addr2()) else {
            return Ok(());
        };
        if dst != BSSID && !dst.is_broadcast() {
            return Ok(());
        }
        match frame.control().ty() {
            ty::MANAGEMENT => self.handle_mgmt(&frame, src),
            ty::DATA => {
                self.discarded_data += 1;
                #[cfg(feature = "log")]
                slog::trace!(self.logger, "Discarding {} byte data frame", frame.len());
            }
            _ => {}
        }
        Ok(())
    }

    fn on_tick(&mut self, inbound: &mut Inbound) {
        if !self.initialized {
            return;
        }
        while let Some(frame) = self.pending.pop_front() {
            inbound.push(frame);
        }
        self.ms_counter += 1;
        if self.ms_counter % u64::from(self.beacon_interval_ms) == 0 {
            let beacon = self.beacon();
            inbound.push(beacon);
        }
    }
}
