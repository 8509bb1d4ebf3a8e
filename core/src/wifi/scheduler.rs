use super::{
    backend::Inbound,
    frame::{rx_header, Rate, TxHeader, FCS_LEN, RX_HEADER_LEN, TX_HEADER_LEN},
    regs::*,
    Frame, WiFi, RAM_SIZE,
};

/// Long preamble and PLCP header.
pub const PREAMBLE_US: u32 = 192;
pub const ACK_TICKS: u32 = 1;

/// Number of 1 ms ticks it takes to put `len` bytes on the air, rounded up.
pub fn transmit_ticks(len: usize, rate: Rate) -> u32 {
    let us = PREAMBLE_US + (len as u32 * 8) / rate.mbps();
    ((us + 999) / 1000).max(1)
}

pub(super) struct OutboundFrame {
    pub frame: Frame,
    pub rate: Rate,
    /// The hardware slot the frame was read from, if software queued it through registers.
    pub slot: Option<TxSlot>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TxState {
    #[default]
    Idle,
    Transmitting {
        slot: Option<TxSlot>,
        unicast: bool,
        ticks_left: u32,
    },
    WaitAck {
        slot: Option<TxSlot>,
        ticks_left: u32,
    },
    Beaconing {
        ticks_left: u32,
    },
}

pub(super) struct Scheduler {
    pub state: TxState,
    pub beacon_due: bool,
    pub ticks: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            state: TxState::Idle,
            beacon_due: false,
            ticks: 0,
        }
    }
}

impl WiFi {
    /// Advances the controller by one millisecond.
    pub fn tick(&mut self) {
        self.scheduler.ticks += 1;

        if self.backend_reset_pending {
            self.backend_reset_pending = false;
            if let Some(backend) = &mut self.backend {
                backend.reset();
            }
        }

        self.advance_timers();

        if self.hardware_active() {
            self.collect_tx_slots();
        }

        if let Some(backend) = &mut self.backend {
            backend.on_tick(&mut Inbound::new(&mut self.inbound, &mut self.stats));
        }

        self.advance_tx();
        self.deliver_inbound();
    }

    /// Runs `ticks` consecutive ticks.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    fn advance_timers(&mut self) {
        if self.reg(W_US_COUNTCNT) & 1 != 0 {
            self.us_count = self.us_count.wrapping_add(1000);
        }
        self.advance_random();

        if self.reg(W_US_COMPARECNT) & 1 == 0 {
            return;
        }
        let interval = self.reg(W_BEACONINT) & 0x3FF;
        if interval == 0 {
            return;
        }

        let mut count = self.reg(W_BEACONCOUNT1);
        if count == 0 {
            count = interval;
        }
        count -= 1;

        let pre_beacon_ms = u32::from(self.reg(W_PRE_BEACON)).div_ceil(1000);
        if count != 0 && u32::from(count) == pre_beacon_ms {
            self.raise_irqs(|irqs| irqs.with_pre_beacon(true));
        }

        if count == 0 {
            self.raise_irqs(|irqs| irqs.with_beacon(true));
            self.set_reg(W_BEACONCOUNT1, interval);
            self.set_reg(W_BEACONCOUNT2, 0);
            let listen_count = self.reg(W_LISTENCOUNT);
            self.set_reg(
                W_LISTENCOUNT,
                if listen_count == 0 {
                    self.reg(W_LISTENINT)
                } else {
                    listen_count - 1
                },
            );
            if TxBufLoc(self.reg(W_TXBUF_BEACON)).enabled() {
                self.scheduler.beacon_due = true;
            }
        } else {
            self.set_reg(W_BEACONCOUNT1, count);
            self.set_reg(W_BEACONCOUNT2, self.reg(W_BEACONCOUNT2).wrapping_add(1));
        }
    }

    /// Reads the header and frame software placed at `loc` in WiFi RAM.
    fn read_tx_frame(&self, loc: TxBufLoc) -> Option<(TxHeader, Frame)> {
        let start = loc.ram_offset();
        let header_bytes = self.ram.get(start..start + TX_HEADER_LEN)?;
        let header = TxHeader::parse(header_bytes.try_into().ok()?);
        let frame_start = start + TX_HEADER_LEN;
        let frame = self
            .ram
            .get(frame_start..frame_start + header.frame_len())?
            .to_vec();
        Some((header, Frame::new(frame)))
    }

    fn fail_slot(&mut self, slot: TxSlot) {
        self.set_reg(W_TXREQ_READ, self.reg(W_TXREQ_READ) & !slot.flag().bits());
        self.set_reg(W_TX_ERR_COUNT, (self.reg(W_TX_ERR_COUNT) + 1) & 0xFF);
        self.raise_irqs(|irqs| irqs.with_tx_error_inc(true));
    }

    fn collect_tx_slots(&mut self) {
        let requested = TxSlots::from_bits_truncate(self.reg(W_TXREQ_READ)) - self.queued_slots;
        if requested.is_empty() {
            return;
        }
        for slot in TxSlot::REQUESTABLE {
            if !requested.contains(slot.flag()) {
                continue;
            }
            let loc = TxBufLoc(self.reg(slot.loc_reg()));
            if !loc.enabled() {
                continue;
            }
            let Some((header, frame)) = self.read_tx_frame(loc) else {
                #[cfg(feature = "log")]
                slog::warn!(self.logger, "{:?} slot points outside of WiFi RAM", slot);
                self.fail_slot(slot);
                continue;
            };
            let dropped = self.outbound.push(OutboundFrame {
                frame,
                rate: header.rate,
                slot: Some(slot),
            });
            if dropped.is_some() {
                self.stats.tx_dropped += 1;
                self.fail_slot(slot);
            } else {
                self.queued_slots |= slot.flag();
                self.set_reg(W_TXBUSY, self.reg(W_TXBUSY) | slot.flag().bits());
            }
        }
    }

    fn send(&mut self, frame: &Frame) {
        self.stats.tx_frames += 1;
        let Some(backend) = &mut self.backend else {
            self.stats.tx_discarded += 1;
            return;
        };
        if let Err(_err) = backend.send_packet(frame.as_bytes()) {
            self.stats.tx_errors += 1;
            #[cfg(feature = "log")]
            slog::warn!(self.logger, "Couldn't send {:?}: {}", frame, _err);
        }
    }

    fn start_tx(&mut self) {
        if self.scheduler.beacon_due {
            self.scheduler.beacon_due = false;
            let loc = TxBufLoc(self.reg(W_TXBUF_BEACON));
            if let Some((header, frame)) = self.read_tx_frame(loc) {
                self.set_reg(W_TXBUSY, self.reg(W_TXBUSY) | TxSlots::BEACON.bits());
                self.send(&frame);
                self.stats.beacons_sent += 1;
                self.scheduler.state = TxState::Beaconing {
                    ticks_left: transmit_ticks(frame.len() + FCS_LEN, header.rate),
                };
                return;
            }
        }

        let Some(outbound) = self.outbound.pop() else {
            return;
        };
        let unicast = outbound
            .frame
            .addr1()
            .map_or(false, |addr| !addr.is_multicast());
        if outbound.slot.is_some() {
            self.raise_irqs(|irqs| irqs.with_tx_start(true));
        }
        self.send(&outbound.frame);
        self.scheduler.state = TxState::Transmitting {
            slot: outbound.slot,
            unicast,
            ticks_left: transmit_ticks(outbound.frame.len() + FCS_LEN, outbound.rate),
        };
    }

    fn finish_tx(&mut self, slot: Option<TxSlot>) {
        let Some(slot) = slot else {
            return;
        };
        let loc_reg = slot.loc_reg();
        let loc = TxBufLoc(self.reg(loc_reg));
        self.set_ram_16(loc.ram_offset(), 1);
        self.set_reg(loc_reg, loc.with_enabled(false).0);
        self.set_reg(W_TXREQ_READ, self.reg(W_TXREQ_READ) & !slot.flag().bits());
        self.set_reg(W_TXBUSY, self.reg(W_TXBUSY) & !slot.flag().bits());
        self.queued_slots -= slot.flag();
        self.set_reg(W_TXSTAT, 1 | slot.stat_code() << 8);
        self.raise_irqs(|irqs| irqs.with_tx_complete(true));
    }

    /// Forgets every frame read from a TX slot, including one currently on the air. Frames
    /// enqueued through the API are kept.
    pub(super) fn abort_slot_tx(&mut self) {
        self.outbound.retain(|outbound| outbound.slot.is_none());
        if let TxState::Transmitting { slot: Some(_), .. } | TxState::WaitAck { slot: Some(_), .. } =
            self.scheduler.state
        {
            self.scheduler.state = TxState::Idle;
        }
    }

    fn finish_beacon(&mut self) {
        let loc = TxBufLoc(self.reg(W_TXBUF_BEACON));
        self.set_ram_16(loc.ram_offset(), 1);
        self.set_reg(W_TXBUSY, self.reg(W_TXBUSY) & !TxSlots::BEACON.bits());
        self.set_reg(W_TXSTAT, 1 | TxSlot::Beacon.stat_code() << 8);
        self.raise_irqs(|irqs| irqs.with_post_beacon(true));
    }

    fn advance_tx(&mut self) {
        self.scheduler.state = match self.scheduler.state {
            TxState::Idle => {
                self.start_tx();
                return;
            }

            TxState::Transmitting {
                slot,
                unicast,
                ticks_left,
            } => {
                if ticks_left > 1 {
                    TxState::Transmitting {
                        slot,
                        unicast,
                        ticks_left: ticks_left - 1,
                    }
                } else if unicast {
                    TxState::WaitAck {
                        slot,
                        ticks_left: ACK_TICKS,
                    }
                } else {
                    self.finish_tx(slot);
                    TxState::Idle
                }
            }

            TxState::WaitAck { slot, ticks_left } => {
                if ticks_left > 1 {
                    TxState::WaitAck {
                        slot,
                        ticks_left: ticks_left - 1,
                    }
                } else {
                    self.finish_tx(slot);
                    TxState::Idle
                }
            }

            TxState::Beaconing { ticks_left } => {
                if ticks_left > 1 {
                    TxState::Beaconing {
                        ticks_left: ticks_left - 1,
                    }
                } else {
                    self.finish_beacon();
                    TxState::Idle
                }
            }
        };
    }

    fn accepts(&self, frame: &Frame) -> bool {
        match frame.addr1() {
            Some(addr) => {
                addr.is_multicast() || addr == self.mac_addr() || self.reg(W_RXFILTER) & 1 != 0
            }
            None => false,
        }
    }

    /// Copies a received frame into the RX ring buffer, returning `false` if it doesn't fit.
    fn write_rx_frame(&mut self, frame: &Frame) -> bool {
        let begin = (self.reg(W_RXBUF_BEGIN) & 0x1FFE) as usize;
        let end = (self.reg(W_RXBUF_END) & 0x1FFE) as usize;
        if end <= begin {
            return false;
        }
        let ring_len = end - begin;
        let total_len = (RX_HEADER_LEN + frame.len() + 3) & !3;

        let mut wr_pos = (self.reg(W_RXBUF_WRCSR) as usize) << 1;
        if !(begin..end).contains(&wr_pos) {
            wr_pos = begin;
        }
        let rd_pos = (self.reg(W_RXBUF_READCSR) as usize) << 1;
        let free = if (begin..end).contains(&rd_pos) && rd_pos > wr_pos {
            rd_pos - wr_pos
        } else if (begin..end).contains(&rd_pos) && rd_pos < wr_pos {
            ring_len - (wr_pos - rd_pos)
        } else {
            ring_len
        };
        // A completely full ring would be indistinguishable from an empty one
        if total_len >= free {
            return false;
        }

        self.raise_irqs(|irqs| irqs.with_rx_start(true));
        let bssid_match = frame.addr3() == Some(self.bssid());
        let header = rx_header(frame, Rate::Mbps2, bssid_match);
        let padding = [0; 3];
        let bytes = header
            .iter()
            .chain(frame.as_bytes())
            .chain(&padding[..total_len - RX_HEADER_LEN - frame.len()]);
        let mut pos = wr_pos;
        for &byte in bytes {
            self.ram[pos & (RAM_SIZE - 1)] = byte;
            pos += 1;
            if pos == end {
                pos = begin;
            }
        }
        self.set_reg(W_RXBUF_WRCSR, (pos >> 1) as u16);
        self.set_reg(W_RX_COUNT, (self.reg(W_RX_COUNT) + 1) & 0xFF);
        self.raise_irqs(|irqs| irqs.with_rx_complete(true));
        true
    }

    fn deliver_inbound(&mut self) {
        if !self.hardware_active() || !RxControl(self.reg(W_RXCNT)).enabled() {
            return;
        }
        while let Some(frame) = self.inbound.pop() {
            if !self.accepts(&frame) {
                self.stats.rx_filtered += 1;
                continue;
            }
            if self.write_rx_frame(&frame) {
                self.stats.rx_delivered += 1;
            } else {
                self.stats.rx_ring_overflows += 1;
                self.raise_irqs(|irqs| irqs.with_rx_event_overflow(true));
                #[cfg(feature = "log")]
                slog::debug!(self.logger, "RX buffer full, dropping {:?}", frame);
            }
        }
    }
}
