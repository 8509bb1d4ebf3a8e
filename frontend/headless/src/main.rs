mod config;
mod logging;

use clap::Parser;
use dust_wifi::{firmware::WifiSettings, wifi::BackendKind, WiFi};
use std::{fs, path::PathBuf, process};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// JSON configuration file.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Firmware image to read calibration data and access point slots from.
    #[clap(short, long)]
    firmware: Option<PathBuf>,

    /// Number of emulated milliseconds to run for.
    #[clap(short, long, default_value_t = 1000)]
    ms: u64,

    /// Overrides the configured backend (none, adhoc or soft-ap).
    #[clap(short, long)]
    backend: Option<String>,

    /// Overrides the configured log verbosity (0-5).
    #[clap(short, long)]
    verbosity: Option<u8>,
}

fn fail(message: &str) -> ! {
    eprintln!("{message}");
    process::exit(1);
}

fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::read(path).unwrap_or_else(|err| {
            fail(&format!("Couldn't read config from {}: {err}", path.display()))
        }),
        None => dust_wifi::Config::default(),
    };
    if let Some(name) = &args.backend {
        config.backend = BackendKind::available()
            .iter()
            .copied()
            .find(|kind| kind.name() == name.as_str())
            .unwrap_or_else(|| fail(&format!("Unknown or unavailable backend: {name}")));
    }
    if let Some(verbosity) = args.verbosity {
        config.log_verbosity = verbosity;
    }

    let settings = match &args.firmware {
        Some(path) => {
            let image = fs::read(path).unwrap_or_else(|err| {
                fail(&format!("Couldn't read firmware from {}: {err}", path.display()))
            });
            WifiSettings::from_firmware(&image)
                .unwrap_or_else(|err| fail(&format!("Invalid firmware: {err}")))
        }
        None => WifiSettings::default(),
    };

    let logger = dust_wifi::config::filter_logger(logging::init(), config.log_verbosity);
    let mut wifi = WiFi::new(settings, &config, logger.clone());
    slog::info!(
        logger,
        "Running {} ms with the {} backend",
        args.ms,
        wifi.backend_kind().name()
    );

    wifi.run(args.ms);

    let mut received = 0_usize;
    while wifi.dequeue_inbound().is_some() {
        received += 1;
    }
    slog::info!(
        logger,
        "Channel {}, {} frames left in the inbound queue",
        wifi.channel().get(),
        received
    );
    match serde_json::to_string_pretty(wifi.stats()) {
        Ok(stats) => println!("{stats}"),
        Err(err) => fail(&format!("Couldn't serialize statistics: {err}")),
    }
}
