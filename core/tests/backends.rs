mod common;

use common::{data_frame, events, wifi, RecordingBackend, SharedRecord};
use dust_wifi::{
    config::SoftApConfig,
    wifi::{backend::soft_ap, frame::mgmt, BackendKind, InitError, MacAddr},
    Config,
};

fn disabled() -> Config {
    Config {
        backend: BackendKind::None,
        ..Config::default()
    }
}

#[test]
fn switching_shuts_down_before_init() {
    let record = SharedRecord::default();
    let mut wifi = wifi(&disabled());

    wifi.bind_backend(
        BackendKind::Adhoc,
        Some(Box::new(RecordingBackend::new("a", &record))),
    )
    .unwrap();
    assert_eq!(wifi.backend_kind(), BackendKind::Adhoc);

    wifi.bind_backend(
        BackendKind::SoftAp,
        Some(Box::new(RecordingBackend::new("b", &record))),
    )
    .unwrap();
    assert_eq!(events(&record), ["init a", "shutdown a", "init b"]);
    assert_eq!(wifi.backend_kind(), BackendKind::SoftAp);

    drop(wifi);
    assert_eq!(events(&record).last().map(String::as_str), Some("shutdown b"));
}

#[test]
fn failed_init_leaves_backend_disabled() {
    let record = SharedRecord::default();
    let mut wifi = wifi(&disabled());
    wifi.bind_backend(
        BackendKind::SoftAp,
        Some(Box::new(RecordingBackend::new("a", &record))),
    )
    .unwrap();

    let result = wifi.bind_backend(
        BackendKind::Adhoc,
        Some(Box::new(RecordingBackend::new("b", &record).failing())),
    );
    assert_eq!(result, Err(InitError::InvalidConfig("refused")));
    assert_eq!(events(&record), ["init a", "shutdown a", "init b"]);
    assert_eq!(wifi.backend_kind(), BackendKind::None);

    // Frames still go through the timing model, but reach nobody
    assert!(wifi.enqueue_outbound(data_frame([0xFF; 6], [2; 6], &[1, 2, 3])));
    wifi.run(4);
    assert_eq!(wifi.stats().tx_frames, 1);
    assert_eq!(wifi.stats().tx_discarded, 1);
    assert!(record.borrow().sent.is_empty());
}

#[test]
fn null_backend_never_sends() {
    let record = SharedRecord::default();
    let mut wifi = wifi(&disabled());
    wifi.bind_backend(
        BackendKind::Adhoc,
        Some(Box::new(RecordingBackend::new("a", &record))),
    )
    .unwrap();
    wifi.bind_backend(BackendKind::None, None).unwrap();

    for i in 0..5 {
        assert!(wifi.enqueue_outbound(data_frame([0xFF; 6], [2; 6], &[i])));
    }
    wifi.run(20);
    assert_eq!(wifi.stats().tx_frames, 5);
    assert_eq!(wifi.stats().tx_discarded, 5);
    assert_eq!(wifi.stats().tx_errors, 0);
    assert!(record.borrow().sent.is_empty());
    assert!(wifi.dequeue_inbound().is_none());
}

#[test]
fn loopback_round_trip_is_unmodified() {
    let record = SharedRecord::default();
    let mut wifi = wifi(&disabled());
    wifi.bind_backend(
        BackendKind::Adhoc,
        Some(Box::new(RecordingBackend::new("loop", &record).loopback())),
    )
    .unwrap();

    let frame = data_frame([0xFF; 6], [2; 6], b"hello over the air");
    assert!(wifi.enqueue_outbound(frame.clone()));
    wifi.run(2);
    assert_eq!(record.borrow().sent, [frame.as_bytes().to_vec()]);
    assert_eq!(wifi.dequeue_inbound(), Some(frame));
    assert_eq!(wifi.dequeue_inbound(), None);
}

#[test]
fn failed_send_is_counted_and_transmission_continues() {
    let record = SharedRecord::default();
    let mut wifi = wifi(&disabled());
    wifi.bind_backend(
        BackendKind::Adhoc,
        Some(Box::new(RecordingBackend::new("a", &record).failing_sends(1))),
    )
    .unwrap();

    let first = data_frame([0xFF; 6], [2; 6], &[1]);
    let second = data_frame([0xFF; 6], [2; 6], &[2]);
    assert!(wifi.enqueue_outbound(first));
    assert!(wifi.enqueue_outbound(second.clone()));
    wifi.run(4);

    assert_eq!(wifi.stats().tx_frames, 2);
    assert_eq!(wifi.stats().tx_errors, 1);
    assert_eq!(wifi.stats().tx_discarded, 0);
    assert_eq!(record.borrow().sent, [second.as_bytes().to_vec()]);
}

#[test]
fn select_backend_reports_the_configured_strategy() {
    let mut wifi = wifi(&disabled());
    assert_eq!(wifi.backend_kind(), BackendKind::None);

    wifi.select_backend(&Config::default()).unwrap();
    assert_eq!(wifi.backend_kind(), BackendKind::SoftAp);

    wifi.select_backend(&disabled()).unwrap();
    assert_eq!(wifi.backend_kind(), BackendKind::None);

    let mut invalid = Config::default();
    invalid.soft_ap.beacon_interval_ms = 0;
    assert!(wifi.select_backend(&invalid).is_err());
    assert_eq!(wifi.backend_kind(), BackendKind::None);
}

fn soft_ap_beacons(interval: u32, ticks: u64) -> usize {
    let config = Config {
        backend: BackendKind::SoftAp,
        inbound_capacity: 256,
        soft_ap: SoftApConfig {
            beacon_interval_ms: interval,
            ..SoftApConfig::default()
        },
        ..Config::default()
    };
    let mut wifi = wifi(&config);
    assert_eq!(wifi.backend_kind(), BackendKind::SoftAp);
    wifi.run(ticks);

    let mut beacons = 0;
    while let Some(frame) = wifi.dequeue_inbound() {
        assert!(frame.is_mgmt(mgmt::BEACON));
        assert_eq!(frame.addr2(), Some(soft_ap::BSSID));
        beacons += 1;
    }
    beacons
}

#[test]
fn soft_ap_beacon_count() {
    assert_eq!(soft_ap_beacons(100, 1000), 10);
    assert_eq!(soft_ap_beacons(100, 999), 9);
    assert_eq!(soft_ap_beacons(30, 100), 3);
    assert_eq!(soft_ap_beacons(1, 17), 17);
}

#[test]
fn soft_ap_answers_through_the_controller() {
    let mut wifi = wifi(&Config::default());
    let sta = wifi.mac_addr();
    let probe = dust_wifi::wifi::frame::MgmtFrameBuilder::new(
        mgmt::PROBE_REQ,
        MacAddr::BROADCAST,
        sta,
        MacAddr::BROADCAST,
        0,
    )
    .build();
    assert!(wifi.enqueue_outbound(probe));
    wifi.run(2);

    let response = wifi.dequeue_inbound().unwrap();
    assert!(response.is_mgmt(mgmt::PROBE_RESP));
    assert_eq!(response.addr1(), Some(sta));
}

#[test]
fn registry_lists_compiled_in_strategies() {
    let available = BackendKind::available();
    assert!(available.contains(&BackendKind::None));
    assert!(available.contains(&BackendKind::SoftAp));
    assert_eq!(
        available.contains(&BackendKind::Adhoc),
        cfg!(feature = "adhoc")
    );
}
