//! Compiled-in WiFi calibration data, used when no firmware image is supplied.
//!
//! Values are the ones found in retail firmware for consoles with a type 2 RF chip, stored as
//! bytes so they can be copied into a firmware image verbatim.

use super::{crc16, AccessPointProfile, WifiSettings, AP_PROFILES_POS, WIFI_LEN};
use crate::wifi::MacAddr;

pub static MAC_ADDR: MacAddr = MacAddr([0x00, 0x09, 0xBF, 0x12, 0x34, 0x56]);

/// Initial values for the 16 `W_CONFIG` registers, see [`super::WIFI_INIT_REGS`].
pub static WIFI_INIT: [u8; 32] = [
    0x02, 0x00, 0x17, 0x00, 0x26, 0x00, 0x18, 0x18, //
    0x48, 0x00, 0x40, 0x48, 0x58, 0x00, 0x42, 0x00, //
    0x40, 0x01, 0x64, 0x80, 0xE0, 0xE0, 0x43, 0x24, //
    0x0E, 0x00, 0x32, 0x00, 0xF4, 0x01, 0x01, 0x01,
];

/// Initial values for BB[0x00..=0x68].
pub static BB_INIT: [u8; 0x69] = [
    0x6D, 0x9E, 0x40, 0x05, 0x1B, 0x6C, 0x48, 0x80, //
    0x38, 0x00, 0x35, 0x07, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0xB0, 0x00, 0x04, 0x01, //
    0xD8, 0xFF, 0xFF, 0xC7, 0xBB, 0x01, 0xB6, 0x7F, //
    0x5A, 0x01, 0x3F, 0x01, 0x3F, 0x36, 0x36, 0x00, //
    0x78, 0x28, 0x55, 0x08, 0x28, 0x16, 0x00, 0x01, //
    0x0E, 0x20, 0x02, 0x98, 0x98, 0x1F, 0x0A, 0x08, //
    0x04, 0x01, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFE, //
    0xFE, 0xFE, 0xFE, 0xFC, 0xFA, 0xFA, 0xF8, 0xF8, //
    0xF6, 0xA5, 0x12, 0x14, 0x12, 0x41, 0x23, 0x03, //
    0x04, 0x70, 0x35, 0x0E, 0x16, 0x16, 0x00, 0x00, //
    0x06, 0x01, 0xFF, 0xFE, 0xFF, 0xFF, 0x00, 0x0E, //
    0x13, 0x00, 0x00, 0x28, 0x1C, 0x00, 0x00, 0x00, //
    0x00,
];

/// 12 24-bit RF transfers, little-endian.
pub static RF_INIT: [u8; 36] = [
    0x07, 0xC0, 0x00, //
    0x03, 0x9C, 0x12, //
    0x28, 0x17, 0x14, //
    0xBA, 0xE8, 0x1A, //
    0x6F, 0x45, 0x1D, //
    0xFA, 0xFF, 0x23, //
    0x30, 0x1D, 0x24, //
    0x01, 0x00, 0x28, //
    0x00, 0x00, 0x2C, //
    0x03, 0x9C, 0x06, //
    0x22, 0x00, 0x08, //
    0x6F, 0xFF, 0x0D,
];

/// Per channel, the 24-bit transfers for RF[5] and RF[6].
pub static RF_CHANNELS: [u8; 6 * 14] = [
    0x28, 0x17, 0x14, 0xBA, 0xE8, 0x1A, // 1
    0x37, 0x17, 0x14, 0x46, 0x17, 0x19, // 2
    0x45, 0x17, 0x14, 0xD1, 0x45, 0x1B, // 3
    0x54, 0x17, 0x14, 0x5D, 0x74, 0x19, // 4
    0x62, 0x17, 0x14, 0xE9, 0xA2, 0x1B, // 5
    0x71, 0x17, 0x14, 0x74, 0xD1, 0x19, // 6
    0x80, 0x17, 0x14, 0x00, 0x00, 0x18, // 7
    0x8E, 0x17, 0x14, 0x8C, 0x2E, 0x1A, // 8
    0x9D, 0x17, 0x14, 0x17, 0x5D, 0x18, // 9
    0xAB, 0x17, 0x14, 0xA3, 0x8B, 0x1A, // 10
    0xBA, 0x17, 0x14, 0x2F, 0xBA, 0x18, // 11
    0xC8, 0x17, 0x14, 0xBA, 0xE8, 0x1A, // 12
    0xD7, 0x17, 0x14, 0x46, 0x17, 0x19, // 13
    0xFA, 0x17, 0x14, 0x2F, 0xBA, 0x18, // 14
];

/// Per channel, the value for BB[0x1E].
pub static BB_CHANNELS: [u8; 14] = [
    0xB3, 0xB3, 0xB3, 0xB3, 0xB3, // 1-5
    0xB4, 0xB4, 0xB4, 0xB4, 0xB4, // 6-10
    0xB5, 0xB5, // 11-12
    0xB6, 0xB6, // 13-14
];

pub const ENABLED_CHANNELS: u16 = 0x3FFE;

pub fn ap_profiles() -> [AccessPointProfile; 3] {
    let mut first = AccessPointProfile::named(b"SoftAP");
    first.configured_slots = 1;
    [
        first,
        AccessPointProfile::unconfigured(),
        AccessPointProfile::unconfigured(),
    ]
}

/// Writes the WiFi calibration area and the three access point slots of `settings` into a
/// firmware image, recomputing their checksums.
pub fn write_wifi_settings(firmware: &mut [u8], settings: &WifiSettings) {
    let mask = firmware.len() - 1;

    firmware[0x2C..0x2E].copy_from_slice(&(WIFI_LEN as u16).to_le_bytes());
    firmware[0x2F] = 5;
    firmware[0x36..0x3C].copy_from_slice(&settings.mac_addr.0);
    firmware[0x3C..0x3E].copy_from_slice(&settings.enabled_channels.to_le_bytes());
    firmware[0x40] = settings.rf_chip_type;
    firmware[0x41] = 24;
    firmware[0x42] = (settings.rf_init.len() / 3) as u8;
    firmware[0x44..0x64].copy_from_slice(&settings.wifi_init);
    firmware[0x64..0xCD].copy_from_slice(&settings.bb_init);
    firmware[0xCE..0xF2].copy_from_slice(&settings.rf_init);
    firmware[0xF2..0x146].copy_from_slice(&settings.rf_channels);
    firmware[0x146..0x154].copy_from_slice(&settings.bb_channels);
    let crc = crc16(0, &firmware[0x2C..0x2C + WIFI_LEN]);
    firmware[0x2A..0x2C].copy_from_slice(&crc.to_le_bytes());

    for (i, profile) in settings.ap_profiles.iter().enumerate() {
        let start = (AP_PROFILES_POS + i * AccessPointProfile::LEN) & mask;
        profile.write(&mut firmware[start..start + AccessPointProfile::LEN]);
    }
}
