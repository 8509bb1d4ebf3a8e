pub mod default;

use crate::wifi::{Channel, MacAddr};
use core::{fmt, ops::Range};

static CRC16_VALUES: [u16; 8] = [
    0xC0C1, 0xC181, 0xC301, 0xC601, 0xCC01, 0xD801, 0xF001, 0xA001,
];

pub(crate) fn crc16(init: u16, bytes: &[u8]) -> u16 {
    let mut result = init as u32;
    for &byte in bytes {
        result ^= byte as u32;
        for (i, crc) in CRC16_VALUES.iter().enumerate() {
            let carry = result & 1 != 0;
            result >>= 1;
            if carry {
                result ^= (*crc as u32) << (i ^ 7);
            }
        }
    }
    result as u16
}

/// Length of the checksummed WiFi calibration area, starting at 0x2C.
pub const WIFI_LEN: usize = 0x138;

/// Offset of the first access point slot in a 512 KiB image; smaller images mirror it.
pub const AP_PROFILES_POS: usize = 0x7_FA00;

/// `W_CONFIG` registers initialized, in order, from the 16 halfwords at firmware offset 0x44.
pub const WIFI_INIT_REGS: [u16; 16] = [
    0x146, 0x148, 0x14A, 0x14C, 0x120, 0x122, 0x154, 0x144, 0x130, 0x132, 0x140, 0x142, 0x038,
    0x124, 0x128, 0x150,
];

/// The only RF chip type whose channel table layout is supported.
pub const RF_CHIP_TYPE_2: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationRegion {
    Wifi,
    Ap1,
    Ap2,
    Ap3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    IncorrectSize(usize),
    IncorrectCrc16 {
        region: VerificationRegion,
        calculated: u16,
        expected: u16,
    },
    UnsupportedRfChip(u8),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::IncorrectSize(size) => write!(f, "incorrect firmware size: {size:#X}"),
            ParseError::IncorrectCrc16 {
                region,
                calculated,
                expected,
            } => write!(
                f,
                "CRC16 mismatch in {region:?} region: calculated {calculated:#06X}, expected \
                 {expected:#06X}"
            ),
            ParseError::UnsupportedRfChip(ty) => write!(f, "unsupported RF chip type {ty}"),
        }
    }
}

impl std::error::Error for ParseError {}

fn read_u16(bytes: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([bytes[pos], bytes[pos + 1]])
}

fn check_crc(
    firmware: &[u8],
    region: VerificationRegion,
    range: Range<usize>,
    expected_value_pos: usize,
) -> Result<(), ParseError> {
    let calculated = crc16(0, &firmware[range]);
    let expected = read_u16(firmware, expected_value_pos);
    if calculated == expected {
        Ok(())
    } else {
        Err(ParseError::IncorrectCrc16 {
            region,
            calculated,
            expected,
        })
    }
}

fn check_size(firmware: &[u8]) -> Result<(), ParseError> {
    if !firmware.len().is_power_of_two() || !(0x2_0000..=0x8_0000).contains(&firmware.len()) {
        return Err(ParseError::IncorrectSize(firmware.len()));
    }
    Ok(())
}

/// One of the three "Nintendo WFC" connection slots stored at the end of the firmware.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessPointProfile {
    pub proxy_username: [u8; 32],
    pub proxy_password: [u8; 32],
    pub ssid: [u8; 32],
    pub aoss_ssid: [u8; 32],
    pub wep_keys: [[u8; 16]; 4],
    pub ip_addr: [u8; 4],
    pub gateway: [u8; 4],
    pub primary_dns: [u8; 4],
    pub secondary_dns: [u8; 4],
    /// 0 for automatic configuration, otherwise the number of leading ones in the mask.
    pub subnet_prefix_len: u8,
    pub wep_mode: u8,
    pub status: u8,
    pub mtu: u16,
    pub configured_slots: u8,
    pub wfc_user_id: [u8; 6],
}

impl AccessPointProfile {
    pub const LEN: usize = 0x100;

    pub const STATUS_NORMAL: u8 = 0x00;
    pub const STATUS_AOSS: u8 = 0x01;
    pub const STATUS_UNCONFIGURED: u8 = 0xFF;

    pub const fn unconfigured() -> Self {
        AccessPointProfile {
            proxy_username: [0; 32],
            proxy_password: [0; 32],
            ssid: [0; 32],
            aoss_ssid: [0; 32],
            wep_keys: [[0; 16]; 4],
            ip_addr: [0; 4],
            gateway: [0; 4],
            primary_dns: [0; 4],
            secondary_dns: [0; 4],
            subnet_prefix_len: 0,
            wep_mode: 0,
            status: Self::STATUS_UNCONFIGURED,
            mtu: 0,
            configured_slots: 0,
            wfc_user_id: [0; 6],
        }
    }

    /// An open network with automatic addressing; SSIDs longer than 32 bytes are truncated.
    pub fn named(ssid: &[u8]) -> Self {
        let mut result = Self::unconfigured();
        let len = ssid.len().min(32);
        result.ssid[..len].copy_from_slice(&ssid[..len]);
        result.status = Self::STATUS_NORMAL;
        result
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        self.status != Self::STATUS_UNCONFIGURED
    }

    /// The SSID without its zero padding.
    pub fn ssid(&self) -> &[u8] {
        let len = self.ssid.iter().position(|&b| b == 0).unwrap_or(32);
        &self.ssid[..len]
    }

    pub fn parse(bytes: &[u8]) -> Self {
        fn array<const N: usize>(bytes: &[u8], pos: usize) -> [u8; N] {
            let mut result = [0; N];
            result.copy_from_slice(&bytes[pos..pos + N]);
            result
        }

        let mut wep_keys = [[0; 16]; 4];
        for (i, key) in wep_keys.iter_mut().enumerate() {
            *key = array(bytes, 0x80 + i * 16);
        }
        AccessPointProfile {
            proxy_username: array(bytes, 0x00),
            proxy_password: array(bytes, 0x20),
            ssid: array(bytes, 0x40),
            aoss_ssid: array(bytes, 0x60),
            wep_keys,
            ip_addr: array(bytes, 0xC0),
            gateway: array(bytes, 0xC4),
            primary_dns: array(bytes, 0xC8),
            secondary_dns: array(bytes, 0xCC),
            subnet_prefix_len: bytes[0xD0],
            wep_mode: bytes[0xE6],
            status: bytes[0xE7],
            mtu: read_u16(bytes, 0xEA),
            configured_slots: bytes[0xEF],
            wfc_user_id: array(bytes, 0xF0),
        }
    }

    /// Serializes the slot into its 256-byte firmware representation, checksum included.
    pub fn write(&self, bytes: &mut [u8]) {
        let bytes = &mut bytes[..Self::LEN];
        bytes.fill(0);
        bytes[0x00..0x20].copy_from_slice(&self.proxy_username);
        bytes[0x20..0x40].copy_from_slice(&self.proxy_password);
        bytes[0x40..0x60].copy_from_slice(&self.ssid);
        bytes[0x60..0x80].copy_from_slice(&self.aoss_ssid);
        for (i, key) in self.wep_keys.iter().enumerate() {
            bytes[0x80 + i * 16..0x90 + i * 16].copy_from_slice(key);
        }
        bytes[0xC0..0xC4].copy_from_slice(&self.ip_addr);
        bytes[0xC4..0xC8].copy_from_slice(&self.gateway);
        bytes[0xC8..0xCC].copy_from_slice(&self.primary_dns);
        bytes[0xCC..0xD0].copy_from_slice(&self.secondary_dns);
        bytes[0xD0] = self.subnet_prefix_len;
        bytes[0xE6] = self.wep_mode;
        bytes[0xE7] = self.status;
        bytes[0xEA..0xEC].copy_from_slice(&self.mtu.to_le_bytes());
        bytes[0xEF] = self.configured_slots;
        bytes[0xF0..0xF6].copy_from_slice(&self.wfc_user_id);
        let crc = crc16(0, &bytes[..0xFE]);
        bytes[0xFE..].copy_from_slice(&crc.to_le_bytes());
    }
}

/// RF and baseband values that tune the radio to a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelTuning {
    /// 24-bit transfers for RF[5] and RF[6].
    pub rf: [u32; 2],
    /// Value for BB[0x1E].
    pub bb: u8,
}

fn tuning_from_tables(rf_channels: &[u8; 84], bb_channels: &[u8; 14], channel: Channel) -> ChannelTuning {
    let i = channel.index();
    let entry = |pos: usize| {
        rf_channels[pos] as u32 | (rf_channels[pos + 1] as u32) << 8 | (rf_channels[pos + 2] as u32) << 16
    };
    ChannelTuning {
        rf: [entry(i * 6), entry(i * 6 + 3)],
        bb: bb_channels[i],
    }
}

/// Looks up the compiled-in tuning values for `channel`.
pub fn channel_tuning(channel: Channel) -> ChannelTuning {
    tuning_from_tables(&default::RF_CHANNELS, &default::BB_CHANNELS, channel)
}

/// Everything the wireless controller needs from the firmware: calibration data, the console's
/// MAC address and the access point slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WifiSettings {
    pub mac_addr: MacAddr,
    pub enabled_channels: u16,
    pub rf_chip_type: u8,
    pub wifi_init: [u8; 32],
    pub bb_init: [u8; 0x69],
    pub rf_init: [u8; 36],
    pub rf_channels: [u8; 84],
    pub bb_channels: [u8; 14],
    pub ap_profiles: [AccessPointProfile; 3],
}

impl Default for WifiSettings {
    fn default() -> Self {
        WifiSettings {
            mac_addr: default::MAC_ADDR,
            enabled_channels: default::ENABLED_CHANNELS,
            rf_chip_type: RF_CHIP_TYPE_2,
            wifi_init: default::WIFI_INIT,
            bb_init: default::BB_INIT,
            rf_init: default::RF_INIT,
            rf_channels: default::RF_CHANNELS,
            bb_channels: default::BB_CHANNELS,
            ap_profiles: default::ap_profiles(),
        }
    }
}

impl WifiSettings {
    /// # Errors
    /// - [`ParseError::IncorrectSize`]: the image is not a power of two between 0x20000 and
    ///   0x80000 bytes.
    /// - [`ParseError::IncorrectCrc16`]: the calibration area or one of the access point slots
    ///   fails its checksum.
    /// - [`ParseError::UnsupportedRfChip`]: the calibration data is for an RF chip other than
    ///   type 2.
    pub fn from_firmware(firmware: &[u8]) -> Result<Self, ParseError> {
        check_size(firmware)?;
        let mask = firmware.len() - 1;

        let wifi_len = read_u16(firmware, 0x2C) as usize;
        check_crc(
            firmware,
            VerificationRegion::Wifi,
            0x2C..0x2C + wifi_len,
            0x2A,
        )?;
        let rf_chip_type = firmware[0x40];
        if rf_chip_type != RF_CHIP_TYPE_2 {
            return Err(ParseError::UnsupportedRfChip(rf_chip_type));
        }

        let mut ap_profiles = default::ap_profiles();
        for (i, (profile, region)) in ap_profiles
            .iter_mut()
            .zip([
                VerificationRegion::Ap1,
                VerificationRegion::Ap2,
                VerificationRegion::Ap3,
            ])
            .enumerate()
        {
            let start = (AP_PROFILES_POS + i * AccessPointProfile::LEN) & mask;
            let bytes = &firmware[start..start + AccessPointProfile::LEN];
            if bytes.iter().all(|&b| b == 0xFF || b == 0) {
                // Erased slot
                *profile = AccessPointProfile::unconfigured();
                continue;
            }
            check_crc(firmware, region, start..start + 0xFE, start + 0xFE)?;
            *profile = AccessPointProfile::parse(bytes);
        }

        let mut settings = WifiSettings {
            mac_addr: MacAddr([0; 6]),
            enabled_channels: read_u16(firmware, 0x3C),
            rf_chip_type,
            wifi_init: [0; 32],
            bb_init: [0; 0x69],
            rf_init: [0; 36],
            rf_channels: [0; 84],
            bb_channels: [0; 14],
            ap_profiles,
        };
        settings.mac_addr.0.copy_from_slice(&firmware[0x36..0x3C]);
        settings.wifi_init.copy_from_slice(&firmware[0x44..0x64]);
        settings.bb_init.copy_from_slice(&firmware[0x64..0xCD]);
        settings.rf_init.copy_from_slice(&firmware[0xCE..0xF2]);
        settings.rf_channels.copy_from_slice(&firmware[0xF2..0x146]);
        settings.bb_channels.copy_from_slice(&firmware[0x146..0x154]);
        Ok(settings)
    }

    /// # Errors
    /// - [`ParseError::IncorrectSize`]: the image is not a power of two between 0x20000 and
    ///   0x80000 bytes.
    pub fn write_to_firmware(&self, firmware: &mut [u8]) -> Result<(), ParseError> {
        check_size(firmware)?;
        default::write_wifi_settings(firmware, self);
        Ok(())
    }

    pub fn channel_tuning(&self, channel: Channel) -> ChannelTuning {
        tuning_from_tables(&self.rf_channels, &self.bb_channels, channel)
    }

    /// Identifies the channel an RF[5] transfer tunes to, if it's in the channel table.
    pub fn channel_for_rf_transfer(&self, transfer: u32) -> Option<Channel> {
        Channel::all().find(|&channel| self.channel_tuning(channel).rf[0] == transfer & 0xFF_FFFF)
    }

    /// Pairs of (`W_CONFIG` register address, initial value).
    pub fn wifi_init_regs(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        WIFI_INIT_REGS
            .iter()
            .enumerate()
            .map(|(i, &addr)| (addr, read_u16(&self.wifi_init, i << 1)))
    }

    /// The 24-bit RF transfers performed on initialization.
    pub fn rf_init_transfers(&self) -> impl Iterator<Item = u32> + '_ {
        self.rf_init
            .chunks_exact(3)
            .map(|entry| entry[0] as u32 | (entry[1] as u32) << 8 | (entry[2] as u32) << 16)
    }
}
