#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    clippy::struct_excessive_bools,
    clippy::too_many_lines,
    clippy::missing_panics_doc,
    clippy::option_if_let_else,
    clippy::module_name_repetitions,
    clippy::verbose_bit_mask,
    clippy::wildcard_imports,
    clippy::must_use_candidate,
    clippy::unused_self,
    clippy::missing_errors_doc,
    clippy::inline_always,
)]

pub mod config;
pub mod firmware;
pub mod wifi;

pub use config::Config;
pub use wifi::WiFi;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum Model {
    Ds,
    #[default]
    Lite,
    Ique,
    IqueLite,
    Dsi,
}

impl Model {
    /// The value `W_ID` reads as on this model's wireless controller.
    pub const fn wifi_chip_id(self) -> u16 {
        match self {
            Model::Ds | Model::Ique => 0x1440,
            Model::Lite | Model::IqueLite | Model::Dsi => 0xC340,
        }
    }
}
