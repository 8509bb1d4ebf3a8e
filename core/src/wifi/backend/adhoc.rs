use super::{Backend, Inbound, InitError, SendError};
use crate::{config::AdhocConfig, wifi::Frame};
use std::{
    io,
    net::UdpSocket,
    time::{SystemTime, UNIX_EPOCH},
};

pub const MAGIC: [u8; 8] = *b"NDSWIFI\0";
pub const HEADER_LEN: usize = 14;
pub const MAX_FRAME_LEN: usize = 2346;
/// Upper bound on packets drained from the transport in a single tick.
pub const MAX_PACKETS_PER_TICK: usize = 16;

/// A datagram transport shared by all emulator instances on a network segment.
pub trait Transport {
    fn open(&mut self) -> io::Result<()>;

    fn close(&mut self);

    fn send(&mut self, packet: &[u8]) -> io::Result<()>;

    /// Receives a single packet without blocking, returning `Ok(None)` if none is pending.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;
}

pub struct UdpTransport {
    interface: String,
    broadcast_addr: String,
    port: u16,
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    pub fn new(config: &AdhocConfig) -> Self {
        UdpTransport {
            interface: config.interface.clone(),
            broadcast_addr: config.broadcast_addr.clone(),
            port: config.port,
            socket: None,
        }
    }

    fn socket(&self) -> io::Result<&UdpSocket> {
        self.socket
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }
}

impl Transport for UdpTransport {
    fn open(&mut self) -> io::Result<()> {
        let socket = UdpSocket::bind((self.interface.as_str(), self.port))?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        self.socket = Some(socket);
        Ok(())
    }

    fn close(&mut self) {
        self.socket = None;
    }

    fn send(&mut self, packet: &[u8]) -> io::Result<()> {
        self.socket()?
            .send_to(packet, (self.broadcast_addr.as_str(), self.port))
            .map(drop)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.socket()?.recv(buf) {
            Ok(len) => Ok(Some(len)),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn random_instance_id() -> u32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.subsec_nanos());
    std::process::id().rotate_left(16) ^ nanos
}

/// Relays frames verbatim between every emulator instance listening on the same transport.
pub struct Adhoc<T: Transport> {
    #[cfg(feature = "log")]
    logger: slog::Logger,
    transport: T,
    instance_id: u32,
    is_open: bool,
    buffer: Box<[u8; HEADER_LEN + MAX_FRAME_LEN]>,
}

impl<T: Transport> Adhoc<T> {
    pub fn new(transport: T, #[cfg(feature = "log")] logger: slog::Logger) -> Self {
        Self::with_instance_id(
            transport,
            random_instance_id(),
            #[cfg(feature = "log")]
            logger,
        )
    }

    pub fn with_instance_id(
        transport: T,
        instance_id: u32,
        #[cfg(feature = "log")] logger: slog::Logger,
    ) -> Self {
        Adhoc {
            #[cfg(feature = "log")]
            logger,
            transport,
            instance_id,
            is_open: false,
            buffer: Box::new([0; HEADER_LEN + MAX_FRAME_LEN]),
        }
    }

    #[inline]
    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn encode(&self, frame: &[u8]) -> Vec<u8> {
        let mut packet = Vec::with_capacity(HEADER_LEN + frame.len());
        packet.extend_from_slice(&MAGIC);
        packet.extend_from_slice(&self.instance_id.to_le_bytes());
        packet.extend_from_slice(&(frame.len() as u16).to_le_bytes());
        packet.extend_from_slice(frame);
        packet
    }

    /// Extracts the frame from a packet sent by another instance.
    fn decode(&self, packet: &[u8]) -> Option<Frame> {
        if packet.len() < HEADER_LEN {
            return None;
        }
        let (header, payload) = packet.split_at(HEADER_LEN);
        if header[..8] != MAGIC {
            return None;
        }
        let sender = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
        if sender == self.instance_id {
            return None;
        }
        let len = u16::from_le_bytes([header[12], header[13]]) as usize;
        Some(Frame::new(payload.get(..len)?.to_vec()))
    }
}

impl<T: Transport> Backend for Adhoc<T> {
    fn name(&self) -> &'static str {
        "adhoc"
    }

    fn init(&mut self) -> Result<(), InitError> {
        if self.is_open {
            return Ok(());
        }
        match self.transport.open() {
            Ok(()) => {
                self.is_open = true;
                #[cfg(feature = "log")]
                slog::info!(self.logger, "Transport open (instance {:#010X})", self.instance_id);
                Ok(())
            }
            Err(err) => {
                self.transport.close();
                #[cfg(feature = "log")]
                slog::error!(self.logger, "Couldn't open transport: {}", err);
                Err(InitError::Transport(err.kind()))
            }
        }
    }

    fn shutdown(&mut self) {
        if self.is_open {
            self.transport.close();
            self.is_open = false;
        }
    }

    fn reset(&mut self) {
        // Drop anything that arrived while the hardware was down
        if !self.is_open {
            return;
        }
        for _ in 0..MAX_PACKETS_PER_TICK {
            if !matches!(self.transport.recv(&mut self.buffer[..]), Ok(Some(_))) {
                break;
            }
        }
    }

    fn send_packet(&mut self, frame: &[u8]) -> Result<(), SendError> {
        if !self.is_open {
            return Err(SendError::NotInitialized);
        }
        if frame.len() > MAX_FRAME_LEN {
            return Err(SendError::TooLarge(frame.len()));
        }
        let packet = self.encode(frame);
        self.transport
            .send(&packet)
            .map_err(|err| SendError::Transport(err.kind()))
    }

    fn on_tick(&mut self, inbound: &mut Inbound) {
        if !self.is_open {
            return;
        }
        for _ in 0..MAX_PACKETS_PER_TICK {
            let len = match self.transport.recv(&mut self.buffer[..]) {
                Ok(Some(len)) => len,
                Ok(None) => break,
                Err(_err) => {
                    #[cfg(feature = "log")]
                    slog::warn!(self.logger, "Receive failed: {}", _err);
                    break;
                }
            };
            if let Some(frame) = self.decode(&self.buffer[..len]) {
                inbound.push(frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wifi::{
        queue::{FrameQueue, OverflowPolicy},
        Stats,
    };
    use std::{cell::RefCell, collections::VecDeque, rc::Rc};

    type Medium = Rc<RefCell<VecDeque<Vec<u8>>>>;

    /// Every instance sees every packet, its own included.
    struct SharedMedium {
        medium: Medium,
        cursor: usize,
        fail_open: bool,
        open: bool,
    }

    impl SharedMedium {
        fn new(medium: &Medium) -> Self {
            SharedMedium {
                medium: Rc::clone(medium),
                cursor: medium.borrow().len(),
                fail_open: false,
                open: false,
            }
        }
    }

    impl Transport for SharedMedium {
        fn open(&mut self) -> io::Result<()> {
            if self.fail_open {
                return Err(io::ErrorKind::PermissionDenied.into());
            }
            self.open = true;
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
        }

        fn send(&mut self, packet: &[u8]) -> io::Result<()> {
            self.medium.borrow_mut().push_back(packet.to_vec());
            Ok(())
        }

        fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
            let medium = self.medium.borrow();
            let Some(packet) = medium.get(self.cursor) else {
                return Ok(None);
            };
            self.cursor += 1;
            buf[..packet.len()].copy_from_slice(packet);
            Ok(Some(packet.len()))
        }
    }

    fn adhoc(medium: &Medium, id: u32) -> Adhoc<SharedMedium> {
        Adhoc::with_instance_id(
            SharedMedium::new(medium),
            id,
            #[cfg(feature = "log")]
            slog::Logger::root(slog::Discard, slog::o!()),
        )
    }

    fn receive(adhoc: &mut Adhoc<SharedMedium>) -> Vec<Frame> {
        let mut queue = FrameQueue::new(64, OverflowPolicy::DropOldest);
        let mut stats = Stats::default();
        adhoc.on_tick(&mut Inbound::new(&mut queue, &mut stats));
        let mut frames = Vec::new();
        while let Some(frame) = queue.pop() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn frames_reach_other_instances_unmodified() {
        let medium = Medium::default();
        let mut a = adhoc(&medium, 1);
        let mut b = adhoc(&medium, 2);
        a.init().unwrap();
        b.init().unwrap();

        let frame: Vec<u8> = (0..40).collect();
        a.send_packet(&frame).unwrap();

        assert_eq!(medium.borrow()[0][..8], MAGIC);
        assert_eq!(medium.borrow()[0].len(), HEADER_LEN + 40);
        assert_eq!(receive(&mut b), [Frame::new(frame)]);
        // Own packets are filtered out
        assert!(receive(&mut a).is_empty());
    }

    #[test]
    fn malformed_packets_are_dropped() {
        let medium = Medium::default();
        let mut b = adhoc(&medium, 2);
        b.init().unwrap();
        medium.borrow_mut().push_back(b"NDSWIFI".to_vec());
        let mut wrong_magic = adhoc(&medium, 3).encode(&[1, 2, 3]);
        wrong_magic[0] = b'X';
        medium.borrow_mut().push_back(wrong_magic);
        let mut truncated = adhoc(&medium, 3).encode(&[1, 2, 3]);
        truncated.pop();
        medium.borrow_mut().push_back(truncated);
        assert!(receive(&mut b).is_empty());
    }

    #[test]
    fn receive_is_bounded_per_tick() {
        let medium = Medium::default();
        let mut a = adhoc(&medium, 1);
        let mut b = adhoc(&medium, 2);
        a.init().unwrap();
        b.init().unwrap();
        for i in 0..MAX_PACKETS_PER_TICK + 4 {
            a.send_packet(&[i as u8; 24]).unwrap();
        }
        assert_eq!(receive(&mut b).len(), MAX_PACKETS_PER_TICK);
        assert_eq!(receive(&mut b).len(), 4);
    }

    #[test]
    fn reset_drains_a_bounded_backlog() {
        let medium = Medium::default();
        let mut a = adhoc(&medium, 1);
        let mut b = adhoc(&medium, 2);
        a.init().unwrap();
        b.init().unwrap();
        for i in 0..MAX_PACKETS_PER_TICK + 4 {
            a.send_packet(&[i as u8; 24]).unwrap();
        }
        b.reset();
        let left = receive(&mut b);
        assert_eq!(left.len(), 4);
        assert_eq!(left[0].as_bytes(), [MAX_PACKETS_PER_TICK as u8; 24]);
    }

    #[test]
    fn failed_open_holds_nothing() {
        let medium = Medium::default();
        let mut transport = SharedMedium::new(&medium);
        transport.fail_open = true;
        let mut a = Adhoc::with_instance_id(
            transport,
            1,
            #[cfg(feature = "log")]
            slog::Logger::root(slog::Discard, slog::o!()),
        );
        assert_eq!(
            a.init(),
            Err(InitError::Transport(io::ErrorKind::PermissionDenied))
        );
        assert!(!a.transport().open);
        assert_eq!(a.send_packet(&[0; 24]), Err(SendError::NotInitialized));
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let medium = Medium::default();
        let mut a = adhoc(&medium, 1);
        a.init().unwrap();
        assert_eq!(
            a.send_packet(&[0; MAX_FRAME_LEN + 1]),
            Err(SendError::TooLarge(MAX_FRAME_LEN + 1))
        );
        assert!(medium.borrow().is_empty());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let medium = Medium::default();
        let mut a = adhoc(&medium, 1);
        a.init().unwrap();
        a.shutdown();
        a.shutdown();
        assert!(!a.transport().open);
        assert_eq!(a.send_packet(&[0; 24]), Err(SendError::NotInitialized));
    }
}
