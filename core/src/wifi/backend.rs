#[cfg(feature = "adhoc")]
pub mod adhoc;
pub mod soft_ap;

use super::{queue::FrameQueue, Frame, Stats};
use crate::{firmware::WifiSettings, Config};
use core::fmt;
use std::io;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitError {
    /// The strategy isn't part of this build.
    Unavailable(BackendKind),
    /// The host transport could not be opened.
    Transport(io::ErrorKind),
    InvalidConfig(&'static str),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InitError::Unavailable(kind) => write!(f, "{kind:?} backend unavailable in this build"),
            InitError::Transport(kind) => write!(f, "couldn't open transport: {kind}"),
            InitError::InvalidConfig(reason) => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for InitError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendError {
    NotInitialized,
    Transport(io::ErrorKind),
    TooLarge(usize),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SendError::NotInitialized => f.write_str("backend not initialized"),
            SendError::Transport(kind) => write!(f, "transport error: {kind}"),
            SendError::TooLarge(len) => write!(f, "frame too large ({len} bytes)"),
        }
    }
}

impl std::error::Error for SendError {}

/// Handle through which a backend hands received frames to the controller.
pub struct Inbound<'a> {
    queue: &'a mut FrameQueue<Frame>,
    stats: &'a mut Stats,
}

impl<'a> Inbound<'a> {
    pub fn new(queue: &'a mut FrameQueue<Frame>, stats: &'a mut Stats) -> Self {
        Inbound { queue, stats }
    }

    /// Queues a frame for reception; when the queue is full the oldest pending frame is lost.
    pub fn push(&mut self, frame: Frame) {
        self.stats.rx_frames += 1;
        if self.queue.push(frame).is_some() {
            self.stats.rx_dropped += 1;
        }
    }
}

/// A transport strategy frames are exchanged through.
///
/// All methods are called from the emulation thread and must not block.
pub trait Backend {
    fn name(&self) -> &'static str;

    /// Acquires transport resources; on failure no resources may be left held.
    fn init(&mut self) -> Result<(), InitError>;

    /// Releases transport resources; calling it more than once has no effect.
    fn shutdown(&mut self);

    /// Clears transport-side state while keeping resources.
    fn reset(&mut self);

    /// Best-effort transmission of an 802.11 frame (without FCS).
    fn send_packet(&mut self, frame: &[u8]) -> Result<(), SendError>;

    /// Called once per emulated millisecond.
    fn on_tick(&mut self, inbound: &mut Inbound);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum BackendKind {
    None,
    Adhoc,
    #[default]
    SoftAp,
}

cfg_if::cfg_if! {
    if #[cfg(feature = "adhoc")] {
        static AVAILABLE: &[BackendKind] =
            &[BackendKind::None, BackendKind::Adhoc, BackendKind::SoftAp];
    } else {
        static AVAILABLE: &[BackendKind] = &[BackendKind::None, BackendKind::SoftAp];
    }
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::None => "none",
            BackendKind::Adhoc => "adhoc",
            BackendKind::SoftAp => "soft-ap",
        }
    }

    /// Strategies compiled into this build.
    #[inline]
    pub fn available() -> &'static [BackendKind] {
        AVAILABLE
    }

    #[inline]
    pub fn is_available(self) -> bool {
        Self::available().contains(&self)
    }
}

/// Instantiates the strategy for `config.backend`, without initializing it. `BackendKind::None`
/// yields no backend.
pub fn create(
    config: &Config,
    settings: &WifiSettings,
    #[cfg(feature = "log")] logger: slog::Logger,
) -> Result<Option<Box<dyn Backend>>, InitError> {
    Ok(match config.backend {
        BackendKind::None => None,

        BackendKind::SoftAp => Some(Box::new(soft_ap::SoftAp::new(
            &config.soft_ap,
            settings,
            config.ap_profile_index,
            #[cfg(feature = "log")]
            logger,
        )?)),

        #[cfg(feature = "adhoc")]
        BackendKind::Adhoc => Some(Box::new(adhoc::Adhoc::new(
            adhoc::UdpTransport::new(&config.adhoc),
            #[cfg(feature = "log")]
            logger,
        ))),

        #[cfg(not(feature = "adhoc"))]
        BackendKind::Adhoc => return Err(InitError::Unavailable(BackendKind::Adhoc)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wifi::queue::OverflowPolicy;

    #[test]
    fn registry_contents() {
        assert!(BackendKind::None.is_available());
        assert!(BackendKind::SoftAp.is_available());
        assert_eq!(BackendKind::Adhoc.is_available(), cfg!(feature = "adhoc"));
    }

    #[test]
    fn inbound_counts_drops() {
        let mut queue = FrameQueue::new(2, OverflowPolicy::DropOldest);
        let mut stats = Stats::default();
        let mut inbound = Inbound::new(&mut queue, &mut stats);
        for i in 0..3 {
            inbound.push(Frame::new(vec![i]));
        }
        assert_eq!(stats.rx_frames, 3);
        assert_eq!(stats.rx_dropped, 1);
        assert_eq!(queue.pop(), Some(Frame::new(vec![1])));
    }

    #[test]
    fn none_creates_nothing() {
        let config = Config {
            backend: BackendKind::None,
            ..Config::default()
        };
        let backend = create(
            &config,
            &WifiSettings::default(),
            #[cfg(feature = "log")]
            slog::Logger::root(slog::Discard, slog::o!()),
        );
        assert!(matches!(backend, Ok(None)));
    }
}
