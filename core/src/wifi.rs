mod io;
mod radio;
mod scheduler;

pub mod backend;
pub mod frame;
pub mod queue;
pub mod regs;

pub use backend::{Backend, BackendKind, Inbound, InitError, SendError};
pub use frame::{Frame, MacAddr};
pub use io::{AccessType, CpuAccess, DebugAccess};
pub use radio::{BB_CHANNEL_REG, RF_CHANNEL_REG};
pub use scheduler::{transmit_ticks, TxState};

use crate::{
    firmware::{AccessPointProfile, ParseError, WifiSettings},
    Config,
};
use frame::Rate;
use queue::{FrameQueue, OverflowPolicy};
use radio::Radio;
use regs::*;
use scheduler::{OutboundFrame, Scheduler};

pub const RAM_SIZE: usize = 0x2000;

/// A 2.4 GHz channel number, between 1 and 14.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(u8);

impl Channel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 14;

    #[inline]
    pub const fn new(number: u8) -> Option<Self> {
        if number >= Self::MIN && number <= Self::MAX {
            Some(Channel(number))
        } else {
            None
        }
    }

    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Position of the channel's entry in the firmware channel tables.
    #[inline]
    pub const fn index(self) -> usize {
        (self.0 - Self::MIN) as usize
    }

    pub fn all() -> impl DoubleEndedIterator<Item = Channel> {
        (Self::MIN..=Self::MAX).map(Channel)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Stats {
    /// Frames whose transmission started, whether or not a backend received them.
    pub tx_frames: u64,
    /// Outbound frames rejected because the queue was full.
    pub tx_dropped: u64,
    /// Frames a backend failed to send.
    pub tx_errors: u64,
    /// Frames transmitted with no backend bound.
    pub tx_discarded: u64,
    /// Frames handed over by the backend.
    pub rx_frames: u64,
    /// Inbound frames lost to a full queue.
    pub rx_dropped: u64,
    pub rx_delivered: u64,
    /// Frames not addressed to the console.
    pub rx_filtered: u64,
    /// Frames that didn't fit in the RX ring buffer.
    pub rx_ring_overflows: u64,
    pub beacons_sent: u64,
    /// Register writes to unknown or read-only addresses.
    pub ignored_writes: u64,
}

pub struct WiFi {
    #[cfg(feature = "log")]
    logger: slog::Logger,
    chip_id: u16,
    regs: Box<[u16; 0x800]>,
    pub ram: Box<[u8; RAM_SIZE]>,
    radio: Radio,
    settings: WifiSettings,
    channel: Channel,
    random: u16,
    us_count: u64,
    outbound: FrameQueue<OutboundFrame>,
    inbound: FrameQueue<Frame>,
    queued_slots: TxSlots,
    scheduler: Scheduler,
    backend: Option<Box<dyn Backend>>,
    backend_kind: BackendKind,
    backend_reset_pending: bool,
    stats: Stats,
}

impl WiFi {
    /// Creates the controller in its power-on state and binds the backend selected in `config`;
    /// if the backend can't be brought up, the controller runs without one.
    pub fn new(
        mut settings: WifiSettings,
        config: &Config,
        #[cfg(feature = "log")] logger: slog::Logger,
    ) -> Self {
        if let Some(mac_addr) = config.mac_addr {
            settings.mac_addr = mac_addr;
        }

        let mut wifi = WiFi {
            #[cfg(feature = "log")]
            logger: crate::config::filter_logger(logger, config.log_verbosity),
            chip_id: config.model.wifi_chip_id(),
            regs: Box::new([0; 0x800]),
            ram: Box::new([0; RAM_SIZE]),
            radio: Radio::new(&settings),
            settings,
            channel: Channel(Channel::MIN),
            random: 1,
            us_count: 0,
            outbound: FrameQueue::new(config.outbound_capacity, OverflowPolicy::DropNewest),
            inbound: FrameQueue::new(config.inbound_capacity, OverflowPolicy::DropOldest),
            queued_slots: TxSlots::empty(),
            scheduler: Scheduler::new(),
            backend: None,
            backend_kind: BackendKind::None,
            backend_reset_pending: false,
            stats: Stats::default(),
        };
        wifi.power_on();

        if let Err(_err) = wifi.select_backend(config) {
            #[cfg(feature = "log")]
            slog::error!(
                wifi.logger,
                "Couldn't start {} backend, continuing without one: {}",
                config.backend.name(),
                _err
            );
        }
        wifi
    }

    fn power_on(&mut self) {
        self.set_reg(W_POWERSTATE, 0x0200);
        let init_regs: Vec<_> = self.settings.wifi_init_regs().collect();
        for (addr, value) in init_regs {
            self.set_reg(addr, value);
        }
        self.set_mac_addr_regs(self.settings.mac_addr);

        let rf_init: Vec<_> = self.settings.rf_init_transfers().collect();
        for transfer in rf_init {
            self.rf_transfer(transfer);
        }

        self.set_reg(W_BEACONINT, 100);
        self.set_reg(W_RXBUF_BEGIN, 0x4000);
        self.set_reg(W_RXBUF_END, 0x4800);
    }

    fn set_mac_addr_regs(&mut self, mac_addr: MacAddr) {
        for (i, halfword) in mac_addr.0.chunks_exact(2).enumerate() {
            self.set_reg(
                W_MACADDR_0 + (i as u16) * 2,
                u16::from_le_bytes([halfword[0], halfword[1]]),
            );
        }
    }

    #[inline]
    fn reg(&self, addr: u16) -> u16 {
        self.regs[(addr as usize & 0xFFF) >> 1]
    }

    #[inline]
    fn set_reg(&mut self, addr: u16, value: u16) {
        self.regs[(addr as usize & 0xFFF) >> 1] = value;
    }

    fn raise_irqs(&mut self, f: impl FnOnce(Irqs) -> Irqs) {
        let irqs = f(Irqs(self.reg(W_IF)));
        self.set_reg(W_IF, irqs.0);
    }

    #[inline]
    fn ram_16(&self, offset: usize) -> u16 {
        let offset = offset & (RAM_SIZE - 2);
        u16::from_le_bytes([self.ram[offset], self.ram[offset + 1]])
    }

    #[inline]
    fn set_ram_16(&mut self, offset: usize, value: u16) {
        let offset = offset & (RAM_SIZE - 2);
        self.ram[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Performs a 24-bit RF transfer, re-tuning the radio when it selects a known channel.
    fn rf_transfer(&mut self, transfer: u32) {
        let (index, _, is_read) = radio::decode_rf_transfer(transfer);
        if is_read {
            let value = self.radio.rf_reg(index);
            self.set_reg(W_RF_DATA1, value as u16);
            let data2 = RfData2(self.reg(W_RF_DATA2)).with_data_hi((value >> 16) as u8 & 3);
            self.set_reg(W_RF_DATA2, data2.0);
            return;
        }
        self.radio.write_rf(transfer);
        if index == RF_CHANNEL_REG {
            if let Some(channel) = self.settings.channel_for_rf_transfer(transfer) {
                self.apply_channel(channel);
            }
        }
    }

    fn apply_channel(&mut self, channel: Channel) {
        let tuning = self.settings.channel_tuning(channel);
        self.radio.tune(&tuning);
        if channel != self.channel {
            #[cfg(feature = "log")]
            slog::debug!(self.logger, "Tuned to channel {}", channel.get());
            self.channel = channel;
        }
    }

    /// Pure read of a 16-bit register; never has side effects.
    #[inline]
    pub fn read_register(&self, addr: u16) -> u16 {
        self.peek_reg(addr & 0xFFE)
    }

    /// Writes a 16-bit register as the CPU would.
    #[inline]
    pub fn write_register(&mut self, addr: u16, value: u16) {
        self.write_reg(addr & 0xFFE, value);
    }

    /// Queues a frame for transmission at 2 Mbit/s. Returns `false` if the outbound queue was
    /// full, in which case the frame is dropped.
    pub fn enqueue_outbound(&mut self, frame: Frame) -> bool {
        let dropped = self.outbound.push(OutboundFrame {
            frame,
            rate: Rate::Mbps2,
            slot: None,
        });
        if dropped.is_some() {
            self.stats.tx_dropped += 1;
            #[cfg(feature = "log")]
            slog::debug!(self.logger, "Outbound queue full, dropping frame");
            return false;
        }
        true
    }

    #[inline]
    pub fn dequeue_inbound(&mut self) -> Option<Frame> {
        self.inbound.pop()
    }

    #[inline]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Tunes the radio to `channel` as if software had selected it through RF register 5.
    pub fn set_channel(&mut self, channel: Channel) {
        self.apply_channel(channel);
    }

    /// Whether the controller is asserting its interrupt line.
    #[inline]
    pub fn irq_pending(&self) -> bool {
        self.reg(W_IF) & self.reg(W_IE) != 0
    }

    #[inline]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    #[inline]
    pub fn tx_state(&self) -> TxState {
        self.scheduler.state
    }

    #[inline]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    #[inline]
    pub fn settings(&self) -> &WifiSettings {
        &self.settings
    }

    #[inline]
    pub fn bb_reg(&self, index: u8) -> u8 {
        self.radio.bb_reg(index)
    }

    #[inline]
    pub fn rf_reg(&self, index: u8) -> u32 {
        self.radio.rf_reg(index)
    }

    #[inline]
    pub fn ap_profiles(&self) -> &[AccessPointProfile; 3] {
        &self.settings.ap_profiles
    }

    /// The address software has programmed into `W_MACADDR`.
    pub fn mac_addr(&self) -> MacAddr {
        let mut bytes = [0; 6];
        for (i, halfword) in bytes.chunks_exact_mut(2).enumerate() {
            halfword.copy_from_slice(&self.reg(W_MACADDR_0 + (i as u16) * 2).to_le_bytes());
        }
        MacAddr(bytes)
    }

    pub fn bssid(&self) -> MacAddr {
        let mut bytes = [0; 6];
        for (i, halfword) in bytes.chunks_exact_mut(2).enumerate() {
            halfword.copy_from_slice(&self.reg(W_BSSID_0 + (i as u16) * 2).to_le_bytes());
        }
        MacAddr(bytes)
    }

    /// Whether the MAC is enabled and powered up.
    #[inline]
    pub fn hardware_active(&self) -> bool {
        ModeReset(self.reg(W_MODE_RST)).active() && self.reg(W_POWERSTATE) & 1 << 9 == 0
    }

    /// Re-reads the access point slots from a firmware image and restarts the backend so that
    /// it picks them up.
    pub fn reload_profiles(&mut self, firmware: &[u8], config: &Config) -> Result<(), ParseError> {
        let parsed = WifiSettings::from_firmware(firmware)?;
        self.settings.ap_profiles = parsed.ap_profiles;
        if let Err(_err) = self.select_backend(config) {
            #[cfg(feature = "log")]
            slog::error!(
                self.logger,
                "Couldn't restart {} backend: {}",
                config.backend.name(),
                _err
            );
        }
        Ok(())
    }

    /// Replaces the active backend: the previous one is shut down before the new one is
    /// initialized. If initialization fails, no backend remains bound.
    ///
    /// `kind` is reported by [`WiFi::backend_kind`] as-is. This is only meant for binding
    /// instrumented backends in tests; use [`WiFi::select_backend`] otherwise.
    #[doc(hidden)]
    pub fn bind_backend(
        &mut self,
        kind: BackendKind,
        backend: Option<Box<dyn Backend>>,
    ) -> Result<(), InitError> {
        if let Some(mut old) = self.backend.take() {
            #[cfg(feature = "log")]
            slog::debug!(self.logger, "Shutting down {} backend", old.name());
            old.shutdown();
        }
        self.backend_kind = BackendKind::None;
        self.backend_reset_pending = false;

        let Some(mut backend) = backend else {
            return Ok(());
        };
        backend.init()?;
        #[cfg(feature = "log")]
        slog::info!(self.logger, "Using {} backend", backend.name());
        self.backend = Some(backend);
        self.backend_kind = kind;
        Ok(())
    }

    /// Creates and binds the backend named in `config`.
    pub fn select_backend(&mut self, config: &Config) -> Result<(), InitError> {
        match backend::create(
            config,
            &self.settings,
            #[cfg(feature = "log")]
            self.logger.new(slog::o!("backend" => config.backend.name())),
        ) {
            Ok(backend) => self.bind_backend(config.backend, backend),
            Err(err) => {
                self.bind_backend(BackendKind::None, None)?;
                Err(err)
            }
        }
    }
}

impl Drop for WiFi {
    fn drop(&mut self) {
        if let Some(backend) = &mut self.backend {
            backend.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware;

    fn wifi(config: &Config) -> WiFi {
        WiFi::new(
            WifiSettings::default(),
            config,
            #[cfg(feature = "log")]
            slog::Logger::root(slog::Discard, slog::o!()),
        )
    }

    #[test]
    fn channel_bounds() {
        assert_eq!(Channel::new(0), None);
        assert_eq!(Channel::new(15), None);
        assert_eq!(Channel::new(14).map(Channel::index), Some(13));
        assert_eq!(Channel::all().count(), 14);
    }

    #[test]
    fn power_on_state() {
        let wifi = wifi(&Config {
            backend: BackendKind::None,
            ..Config::default()
        });
        assert_eq!(wifi.read_register(W_ID), 0xC340);
        assert_eq!(wifi.read_register(W_POWERSTATE), 0x0200);
        assert_eq!(wifi.read_register(0x146), 0x0002);
        assert_eq!(wifi.read_register(0x038), 0x000E);
        assert_eq!(wifi.mac_addr(), firmware::default::MAC_ADDR);
        assert_eq!(wifi.channel().get(), 1);
        assert!(!wifi.hardware_active());
        assert!(!wifi.irq_pending());
    }

    #[test]
    fn mac_override() {
        let mac_addr = MacAddr([0x00, 0x09, 0xBF, 0x01, 0x02, 0x03]);
        let wifi = wifi(&Config {
            backend: BackendKind::None,
            mac_addr: Some(mac_addr),
            ..Config::default()
        });
        assert_eq!(wifi.mac_addr(), mac_addr);
        assert_eq!(wifi.settings().mac_addr, mac_addr);
        assert_eq!(wifi.read_register(W_MACADDR_1), 0x01BF);
    }

    #[test]
    fn invalid_backend_config_falls_back() {
        let mut config = Config::default();
        config.soft_ap.channel = 0;
        let wifi = wifi(&config);
        assert_eq!(wifi.backend_kind(), BackendKind::None);
    }

    #[test]
    fn reload_profiles_changes_ssid() {
        let config = Config::default();
        let mut wifi = wifi(&config);
        let mut settings = WifiSettings::default();
        settings.ap_profiles[0] = AccessPointProfile::named(b"Lobby");
        let mut image = vec![0; 0x2_0000];
        settings.write_to_firmware(&mut image).unwrap();

        wifi.reload_profiles(&image, &config).unwrap();
        assert_eq!(wifi.ap_profiles()[0].ssid(), b"Lobby");
        assert_eq!(wifi.backend_kind(), BackendKind::SoftAp);
        assert!(wifi.reload_profiles(&[0; 16], &config).is_err());
    }
}
