use crate::{
    wifi::{BackendKind, MacAddr},
    Model,
};

pub const DEFAULT_OUTBOUND_CAPACITY: usize = 8;
pub const DEFAULT_INBOUND_CAPACITY: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "kebab-case")
)]
pub struct SoftApConfig {
    pub beacon_interval_ms: u32,
    pub channel: u8,
}

impl Default for SoftApConfig {
    fn default() -> Self {
        SoftApConfig {
            beacon_interval_ms: 100,
            channel: 6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "kebab-case")
)]
pub struct AdhocConfig {
    /// Local address of the network interface to bridge through.
    pub interface: String,
    /// Address packets are broadcast to.
    pub broadcast_addr: String,
    pub port: u16,
}

impl Default for AdhocConfig {
    fn default() -> Self {
        AdhocConfig {
            interface: "0.0.0.0".to_string(),
            broadcast_addr: "255.255.255.255".to_string(),
            port: 7000,
        }
    }
}

/// Settings consumed when the subsystem is created or explicitly reconfigured.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "kebab-case")
)]
pub struct Config {
    pub model: Model,
    pub backend: BackendKind,
    /// Which of the three firmware access point slots the emulated access point advertises.
    pub ap_profile_index: usize,
    /// 0 disables logging, 5 logs everything.
    pub log_verbosity: u8,
    pub outbound_capacity: usize,
    pub inbound_capacity: usize,
    /// Overrides the firmware's MAC address.
    pub mac_addr: Option<MacAddr>,
    pub soft_ap: SoftApConfig,
    pub adhoc: AdhocConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            model: Model::default(),
            backend: BackendKind::SoftAp,
            ap_profile_index: 0,
            log_verbosity: 3,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            mac_addr: None,
            soft_ap: SoftApConfig::default(),
            adhoc: AdhocConfig::default(),
        }
    }
}

#[cfg(feature = "log")]
pub fn verbosity_level(verbosity: u8) -> Option<slog::Level> {
    Some(match verbosity {
        0 => return None,
        1 => slog::Level::Error,
        2 => slog::Level::Warning,
        3 => slog::Level::Info,
        4 => slog::Level::Debug,
        _ => slog::Level::Trace,
    })
}

/// Wraps `logger` so that only records allowed by `verbosity` reach it.
#[cfg(feature = "log")]
pub fn filter_logger(logger: slog::Logger, verbosity: u8) -> slog::Logger {
    use slog::Drain;

    match verbosity_level(verbosity) {
        Some(level) => slog::Logger::root(
            slog::LevelFilter::new(logger, level).ignore_res(),
            slog::o!(),
        ),
        None => slog::Logger::root(slog::Discard, slog::o!()),
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "backend": "none", "soft-ap": { "beacon-interval-ms": 50 } }"#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::None);
        assert_eq!(config.soft_ap.beacon_interval_ms, 50);
        assert_eq!(config.soft_ap.channel, 6);
        assert_eq!(config.adhoc.port, 7000);
        assert_eq!(config.log_verbosity, 3);
    }

    #[test]
    fn mac_override() {
        let config: Config =
            serde_json::from_str(r#"{ "mac-addr": [0, 9, 191, 1, 2, 3] }"#).unwrap();
        assert_eq!(config.mac_addr, Some(MacAddr([0, 9, 191, 1, 2, 3])));
    }
}

#[cfg(all(test, feature = "log"))]
mod log_tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    struct Counter(Arc<AtomicUsize>);

    impl slog::Drain for Counter {
        type Ok = ();
        type Err = slog::Never;

        fn log(&self, _: &slog::Record, _: &slog::OwnedKVList) -> Result<(), slog::Never> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn logged(verbosity: u8) -> usize {
        let count = Arc::new(AtomicUsize::new(0));
        let root = slog::Logger::root(Counter(Arc::clone(&count)), slog::o!());
        let logger = filter_logger(root, verbosity);
        slog::error!(logger, "error");
        slog::info!(logger, "info");
        slog::debug!(logger, "debug");
        count.load(Ordering::Relaxed)
    }

    #[test]
    fn verbosity_filters_records() {
        assert_eq!(logged(0), 0);
        assert_eq!(logged(1), 1);
        assert_eq!(logged(3), 2);
        assert_eq!(logged(4), 3);
    }
}
