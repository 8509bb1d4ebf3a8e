#![allow(dead_code)]

use dust_wifi::{
    firmware::WifiSettings,
    wifi::{Backend, Frame, Inbound, InitError, SendError},
    Config, WiFi,
};
use std::{cell::RefCell, io, rc::Rc};

pub fn wifi(config: &Config) -> WiFi {
    WiFi::new(
        WifiSettings::default(),
        config,
        #[cfg(feature = "log")]
        slog::Logger::root(slog::Discard, slog::o!()),
    )
}

#[derive(Default)]
pub struct Record {
    pub events: Vec<String>,
    pub sent: Vec<Vec<u8>>,
}

pub type SharedRecord = Rc<RefCell<Record>>;

/// A backend that records every call made to it and can echo sent frames back.
pub struct RecordingBackend {
    name: &'static str,
    record: SharedRecord,
    fail_init: bool,
    loopback: bool,
    failed_sends: usize,
    pending: Vec<Vec<u8>>,
}

impl RecordingBackend {
    pub fn new(name: &'static str, record: &SharedRecord) -> Self {
        RecordingBackend {
            name,
            record: Rc::clone(record),
            fail_init: false,
            loopback: false,
            failed_sends: 0,
            pending: Vec::new(),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Makes the next `count` sends fail.
    pub fn failing_sends(mut self, count: usize) -> Self {
        self.failed_sends = count;
        self
    }

    pub fn loopback(mut self) -> Self {
        self.loopback = true;
        self
    }

    fn event(&self, what: &str) {
        self.record
            .borrow_mut()
            .events
            .push(format!("{what} {}", self.name));
    }
}

impl Backend for RecordingBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn init(&mut self) -> Result<(), InitError> {
        self.event("init");
        if self.fail_init {
            Err(InitError::InvalidConfig("refused"))
        } else {
            Ok(())
        }
    }

    fn shutdown(&mut self) {
        self.event("shutdown");
    }

    fn reset(&mut self) {
        self.event("reset");
    }

    fn send_packet(&mut self, frame: &[u8]) -> Result<(), SendError> {
        if self.failed_sends != 0 {
            self.failed_sends -= 1;
            return Err(SendError::Transport(io::ErrorKind::ConnectionRefused));
        }
        self.record.borrow_mut().sent.push(frame.to_vec());
        if self.loopback {
            self.pending.push(frame.to_vec());
        }
        Ok(())
    }

    fn on_tick(&mut self, inbound: &mut Inbound) {
        for frame in self.pending.drain(..) {
            inbound.push(Frame::new(frame));
        }
    }
}

/// A 24-byte data frame from `src` to `dst`.
pub fn data_frame(dst: [u8; 6], src: [u8; 6], payload: &[u8]) -> Frame {
    let mut bytes = vec![0x08, 0x00, 0x00, 0x00];
    bytes.extend_from_slice(&dst);
    bytes.extend_from_slice(&src);
    bytes.extend_from_slice(&src);
    bytes.extend_from_slice(&[0x10, 0x00]);
    bytes.extend_from_slice(payload);
    Frame::new(bytes)
}

pub fn events(record: &SharedRecord) -> Vec<String> {
    record.borrow().events.clone()
}
