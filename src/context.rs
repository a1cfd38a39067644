//! The per-connection transport context and its event loop.
//!
//! A [`Context`] is a single-threaded cooperative event processor. It blocks
//! in [`HostInterface::wait_for_event`] until a datagram arrives, the
//! application writes or closes, or the retransmission timer expires, then
//! handles the event and blocks again. All state lives in the context; no
//! locking is involved anywhere.

use crate::host::{EventSet, HostInterface};
use crate::wire::{Control, StcpHeader};
use bytes::{Buf, Bytes};
use std::time::Duration;

pub(crate) mod seq;
use seq::seq_in;

mod rto;
pub use rto::{RtoEstimator, INIT_RTO, MAX_RTO, MIN_RTO};

mod segment;
pub use segment::{Segment, SegmentQueue};

mod state;
pub use state::State;


/// The sequence-space window, in bytes, that both sides reserve. The send
/// window gates admission of application data; the receive window gates
/// acceptance of peer segments.
pub const WINDOW_SIZE: u32 = 3072;

/// A segment is transmitted at most this many times; one more timeout
/// aborts the connection.
pub const MAX_TRANSMISSIONS: u32 = 6;

/// The initial sequence number of every connection. STCP does not
/// randomise it.
pub const INITIAL_SEQUENCE_NUMBER: u32 = 1;

/// How a connection died. Surfaced from [`run`]; the transport never
/// panics on peer input.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The handshake gave up on the initiating side: the peer never
    /// acknowledged our connection request.
    #[error("connection refused")]
    ConnectionRefused,
    /// The handshake gave up on the accepting side: the peer never
    /// acknowledged our reply to its connection request.
    #[error("connection aborted")]
    ConnectionAborted,
    /// An established connection stopped making progress: a segment went
    /// unacknowledged through every allowed retransmission.
    #[error("broken pipe")]
    BrokenPipe,
}

/// Which end of the handshake this connection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiator: sends the first SYN.
    Active,
    /// Acceptor: waits in LISTEN for a SYN.
    Passive,
}

/// Runs one connection to completion on the caller's thread.
///
/// Opens actively or passively according to `role`, then loops in the
/// host's wait primitive until the connection reaches CLOSED or dies.
/// Returns `Ok(())` after an orderly teardown and a [`TransportError`]
/// when retransmission gives up.
pub fn run<H: HostInterface>(host: &mut H, role: Role) -> Result<(), TransportError> {
    let mut ctx = Context::open(host, role, INITIAL_SEQUENCE_NUMBER);
    loop {
        let mask = ctx.event_mask();
        let deadline = ctx.retransmit_deadline();
        let events = host.wait_for_event(mask, deadline);
        ctx.dispatch(host, events)?;
        if ctx.state == State::Closed {
            return Ok(());
        }
    }
}

/// The state of one connection: the connection machine, both sequence
/// spaces, the retransmission and reassembly queues, and the adaptive
/// retransmission timer.
#[derive(Debug)]
pub struct Context {
    state: State,
    role: Role,
    /// The initial send sequence number.
    iss: u32,
    /// Oldest unacknowledged sequence number.
    snd_una: u32,
    /// Next sequence number to assign on send.
    snd_nxt: u32,
    /// Next in-order sequence number expected from the peer.
    rcv_nxt: u32,
    /// Retransmission queue; its head is the oldest unacknowledged segment.
    send_queue: SegmentQueue,
    /// Out-of-order reassembly queue.
    recv_queue: SegmentQueue,
    rto: RtoEstimator,
    /// The application asked to close but the send window was full. The
    /// FIN goes out as soon as the window has room.
    close_requested: bool,
    mss: usize,
    /// Reused for every inbound datagram and application read; nothing
    /// points into it across an event-loop iteration.
    scratch: Vec<u8>,
}

impl Context {
    /// Creates a context and performs the open: sends the SYN for an
    /// active open, or parks in LISTEN for a passive one.
    pub fn open<H: HostInterface>(host: &mut H, role: Role, iss: u32) -> Self {
        let mss = host.mss();
        let mut ctx = Self {
            state: State::Closed,
            role,
            iss,
            snd_una: iss,
            snd_nxt: iss,
            rcv_nxt: iss,
            send_queue: SegmentQueue::new(),
            recv_queue: SegmentQueue::new(),
            rto: RtoEstimator::new(),
            close_requested: false,
            mss,
            scratch: vec![0; StcpHeader::SIZE + mss],
        };
        tracing::debug!(target: "stcp", iss = ctx.iss, role = ?ctx.role, mss, "open");
        match role {
            Role::Active => {
                let syn = Segment::new(ctx.snd_nxt, Control::SYN, Bytes::new());
                ctx.send_segment(host, syn);
                ctx.set_state(State::SynSent);
            }
            Role::Passive => ctx.set_state(State::Listen),
        }
        ctx
    }

    /// The current connection state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The events worth waking up for right now. During the handshake only
    /// the network can make progress. Afterwards, application data is
    /// masked while the send window is full and once an active close has
    /// cut off the write stream.
    fn event_mask(&self) -> EventSet {
        match self.state {
            State::Listen | State::SynSent | State::SynReceived => EventSet::NETWORK_DATA,
            State::FinWait1 | State::FinWait2 | State::Closing => {
                EventSet::ANY_EVENT.without(EventSet::APP_DATA)
            }
            _ => {
                if self.snd_nxt.wrapping_sub(self.snd_una) >= WINDOW_SIZE {
                    EventSet::ANY_EVENT.without(EventSet::APP_DATA)
                } else {
                    EventSet::ANY_EVENT
                }
            }
        }
    }

    /// When the oldest unacknowledged segment must be retransmitted, or
    /// `None` when nothing is in flight.
    fn retransmit_deadline(&self) -> Option<Duration> {
        self.send_queue
            .head()
            .map(|head| head.sent_at + self.rto.timeout())
    }

    /// Handles one wake-up's worth of events. An empty set means the wait
    /// timed out and the retransmission timer fired.
    fn dispatch<H: HostInterface>(
        &mut self,
        host: &mut H,
        events: EventSet,
    ) -> Result<(), TransportError> {
        if events.is_empty() {
            self.on_timeout(host)?;
        }
        if events.contains(EventSet::APP_DATA) {
            self.on_app_data(host);
        }
        if events.contains(EventSet::NETWORK_DATA) {
            self.on_network_data(host);
        }
        if events.contains(EventSet::APP_CLOSE_REQUESTED) {
            self.close_requested = true;
        }
        self.flush_close(host);
        Ok(())
    }

    /// Retransmits everything outstanding, aborting the connection once a
    /// segment has used up its transmissions.
    fn on_timeout<H: HostInterface>(&mut self, host: &mut H) -> Result<(), TransportError> {
        if self.send_queue.is_empty() {
            return Ok(());
        }
        self.rto.backoff();
        let now = host.now();
        let rcv_nxt = self.rcv_nxt;
        for seg in self.send_queue.iter_mut() {
            if seg.transmissions >= MAX_TRANSMISSIONS {
                let err = match self.state {
                    State::SynSent | State::SynReceived => match self.role {
                        Role::Active => TransportError::ConnectionRefused,
                        Role::Passive => TransportError::ConnectionAborted,
                    },
                    _ => TransportError::BrokenPipe,
                };
                tracing::warn!(target: "stcp", seq = seg.seq, %err, "giving up");
                return Err(err);
            }
            seg.ack = rcv_nxt;
            seg.sent_at = now;
            seg.transmissions += 1;
            tracing::trace!(
                target: "stcp",
                seq = seg.seq,
                end = seg.end(),
                ctl = %seg.ctl,
                count = seg.transmissions,
                "retransmit"
            );
            let header = StcpHeader {
                seq: seg.seq,
                ack: seg.ack,
                ctl: seg.ctl,
                window: WINDOW_SIZE as u16,
            };
            host.network_send(&header.serialize(), &seg.payload);
        }
        Ok(())
    }

    /// Admits up to one segment's worth of application data: at most the
    /// maximum segment size, and never more than the send window has room
    /// for.
    fn on_app_data<H: HostInterface>(&mut self, host: &mut H) {
        let residual = WINDOW_SIZE.saturating_sub(self.snd_nxt.wrapping_sub(self.snd_una));
        let quota = self.mss.min(residual as usize);
        if quota == 0 {
            return;
        }
        let len = host.app_recv(&mut self.scratch[..quota]);
        let payload = Bytes::copy_from_slice(&self.scratch[..len]);
        let seg = Segment::new(self.snd_nxt, Control::ACK, payload);
        self.send_segment(host, seg);
    }

    /// Pulls one datagram off the network and dispatches it through the
    /// connection machine.
    fn on_network_data<H: HostInterface>(&mut self, host: &mut H) {
        let Some(seg) = self.recv_segment(host) else {
            return;
        };
        match self.state {
            State::Listen => self.on_segment_listen(host, seg),
            State::SynSent => self.on_segment_syn_sent(host, seg),
            State::SynReceived => self.on_segment_syn_received(host, seg),
            _ => {
                if seg.ctl.ack() {
                    self.process_ack(host, seg.ack);
                }
                if seg.logical_len() > 0 {
                    self.process_data(host, seg);
                }
            }
        }
    }

    /// LISTEN: anything but a pure connection request is ignored. There is
    /// no RST in this protocol.
    fn on_segment_listen<H: HostInterface>(&mut self, host: &mut H, seg: Segment) {
        if seg.ctl != Control::SYN {
            return;
        }
        self.rcv_nxt = seg.seq.wrapping_add(1);
        let reply = Segment::new(self.snd_nxt, Control::SYN_ACK, Bytes::new());
        self.send_segment(host, reply);
        self.set_state(State::SynReceived);
    }

    /// SYN_SENT: only the second leg of the handshake moves us forward.
    /// There is no simultaneous open.
    fn on_segment_syn_sent<H: HostInterface>(&mut self, host: &mut H, seg: Segment) {
        if seg.ctl != Control::SYN_ACK {
            return;
        }
        self.process_ack(host, seg.ack);
        if self.snd_una != self.snd_nxt {
            // Did not cover our SYN
            return;
        }
        self.rcv_nxt = seg.seq.wrapping_add(1);
        let reply = Segment::new(self.snd_nxt, Control::ACK, Bytes::new());
        self.send_segment(host, reply);
        self.set_state(State::Established);
        host.unblock_application();
    }

    /// SYN_RECEIVED: waiting for the acknowledgment of our SYN,ACK. The
    /// acknowledgment may already carry data, even a FIN.
    fn on_segment_syn_received<H: HostInterface>(&mut self, host: &mut H, seg: Segment) {
        if !seg.ctl.ack() {
            // The peer lost our SYN,ACK; the timer will resend it
            return;
        }
        self.process_ack(host, seg.ack);
        if self.snd_una != self.snd_nxt {
            return;
        }
        self.set_state(State::Established);
        if seg.logical_len() > 0 {
            self.process_data(host, seg);
        }
        host.unblock_application();
    }

    /// Applies an acknowledgment: advances the send window and drops
    /// fully-covered segments off the retransmission queue. Acknowledging
    /// our FIN drives the owning side of the teardown.
    fn process_ack<H: HostInterface>(&mut self, host: &mut H, ack: u32) {
        if !seq_in(ack, self.snd_una, self.snd_nxt) {
            // Stale or bogus; a stale ACK must never rewind the window
            return;
        }
        self.snd_una = ack;
        while let Some(head) = self.send_queue.head() {
            if seq_in(head.end().wrapping_sub(1), self.snd_una, self.snd_nxt) {
                // Still at least partly in flight
                break;
            }
            let Some(acked) = self.send_queue.pop_head() else {
                break;
            };
            if acked.transmissions == 1 {
                // Karn: segments that were retransmitted yield no sample
                self.rto.sample(host.now().saturating_sub(acked.sent_at));
            }
            if acked.ctl.fin() {
                match self.state {
                    State::FinWait1 => self.set_state(State::FinWait2),
                    State::Closing | State::LastAck => self.set_state(State::Closed),
                    _ => {}
                }
            }
        }
    }

    /// Runs a sequence-space-bearing segment through the receive path:
    /// window acceptance, trimming, reassembly, in-order delivery, and the
    /// acknowledgment that answers every such segment.
    fn process_data<H: HostInterface>(&mut self, host: &mut H, seg: Segment) {
        if seg.logical_len() > WINDOW_SIZE {
            // No conforming sender builds one; drop it
            return;
        }

        let wnd_last = self.rcv_nxt.wrapping_add(WINDOW_SIZE - 1);
        let wnd_end = self.rcv_nxt.wrapping_add(WINDOW_SIZE);
        if seq_in(seg.seq, self.rcv_nxt, wnd_last)
            || seq_in(seg.end(), self.rcv_nxt.wrapping_add(1), wnd_end)
        {
            let mut seg = seg;
            self.trim_to_window(&mut seg);
            // Rejected duplicates just fall on the floor
            self.recv_queue.insert(seg);
        }

        // Deliver everything that is now in order.
        loop {
            let wnd_end = self.rcv_nxt.wrapping_add(WINDOW_SIZE);
            let deliverable = match self.recv_queue.head() {
                None => break,
                Some(head) if seq_in(self.rcv_nxt, head.seq, head.end().wrapping_sub(1)) => true,
                Some(head) if seq_in(head.seq, self.rcv_nxt.wrapping_add(1), wnd_end) => {
                    // A gap is still ahead of the cursor
                    break;
                }
                // A larger segment got delivered first; nothing new in here
                Some(_) => false,
            };
            let Some(mut head) = self.recv_queue.pop_head() else {
                break;
            };
            if !deliverable {
                continue;
            }
            self.trim_to_window(&mut head);
            if !head.payload.is_empty() {
                host.app_send(&head.payload);
            }
            if head.ctl.fin() {
                host.fin_received();
                match self.state {
                    // Passive close
                    State::Established => self.set_state(State::CloseWait),
                    // Simultaneous close
                    State::FinWait1 => self.set_state(State::Closing),
                    // The peer's close completes our active close
                    State::FinWait2 => self.set_state(State::Closed),
                    _ => {}
                }
            }
            self.rcv_nxt = head.end();
        }

        // Acknowledge even when nothing was delivered: re-ACKing a
        // duplicate is how the peer recovers from a lost ACK.
        let ack = Segment::new(self.snd_nxt, Control::ACK, Bytes::new());
        self.send_segment(host, ack);
    }

    /// Clips a segment to the receive window: shifts its front up to the
    /// in-order cursor, and drops anything past the window end, control
    /// markers included.
    fn trim_to_window(&self, seg: &mut Segment) {
        if !seq_in(
            seg.seq,
            self.rcv_nxt,
            self.rcv_nxt.wrapping_add(WINDOW_SIZE - 1),
        ) {
            let shift = self.rcv_nxt.wrapping_sub(seg.seq);
            let eat = (shift as usize).min(seg.payload.len());
            seg.payload.advance(eat);
            seg.seq = seg.seq.wrapping_add(shift);
        }

        let wnd_end = self.rcv_nxt.wrapping_add(WINDOW_SIZE);
        let lo = self.rcv_nxt.wrapping_add(1);
        if !seq_in(seg.end(), lo, wnd_end) {
            seg.ctl.clear_markers();
            if !seq_in(seg.end(), lo, wnd_end) {
                // Payload itself runs past the window end
                let overshoot = seg.end().wrapping_sub(wnd_end);
                let cut = (overshoot as usize).min(seg.payload.len());
                seg.payload.truncate(seg.payload.len() - cut);
            }
        }
    }

    /// Sends the latched FIN once the window has room for it.
    fn flush_close<H: HostInterface>(&mut self, host: &mut H) {
        if !self.close_requested {
            return;
        }
        if self.snd_nxt.wrapping_sub(self.snd_una) >= WINDOW_SIZE {
            // Wait until in-flight data drains
            return;
        }
        let fin = Segment::new(self.snd_nxt, Control::FIN, Bytes::new());
        self.send_segment(host, fin);
        self.close_requested = false;
        match self.state {
            State::Established => self.set_state(State::FinWait1),
            State::CloseWait => self.set_state(State::LastAck),
            _ => {}
        }
    }

    /// Stamps and transmits a segment. Anything that occupies sequence
    /// space is enqueued for retransmission before the datagram goes out,
    /// and advances the send cursor; pure acknowledgments are fire-and-
    /// forget. The piggy-backed ack always carries the current receive
    /// cursor.
    fn send_segment<H: HostInterface>(&mut self, host: &mut H, mut seg: Segment) {
        seg.ack = self.rcv_nxt;
        seg.sent_at = host.now();
        seg.transmissions = 1;
        tracing::trace!(
            target: "stcp",
            seq = seg.seq,
            end = seg.end(),
            ctl = %seg.ctl,
            ack = seg.ack,
            len = seg.payload.len(),
            "send"
        );
        let header = StcpHeader {
            seq: seg.seq,
            ack: seg.ack,
            ctl: seg.ctl,
            window: WINDOW_SIZE as u16,
        };
        let wire = header.serialize();
        let payload = seg.payload.clone();
        if seg.logical_len() > 0 {
            self.snd_nxt = seg.end();
            self.send_queue.insert(seg);
        }
        host.network_send(&wire, &payload);
    }

    /// Reads and decodes one datagram. Malformed datagrams are dropped
    /// silently, per the no-RST, no-panic failure model.
    fn recv_segment<H: HostInterface>(&mut self, host: &mut H) -> Option<Segment> {
        let len = host.network_recv(&mut self.scratch);
        let datagram = &self.scratch[..len];
        let (header, data_start) = match StcpHeader::from_bytes(datagram) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::debug!(target: "stcp", %err, "dropping malformed datagram");
                return None;
            }
        };
        let payload = Bytes::copy_from_slice(&datagram[data_start..]);
        let seg = Segment::from_wire(header.seq, header.ack, header.ctl, payload);
        tracing::trace!(
            target: "stcp",
            seq = seg.seq,
            end = seg.end(),
            ctl = %seg.ctl,
            ack = seg.ack,
            len = seg.payload.len(),
            "recv"
        );
        Some(seg)
    }

    fn set_state(&mut self, next: State) {
        tracing::debug!(target: "stcp", from = ?self.state, to = ?next, "transition");
        self.state = next;
    }
}
