//! The boundary between the transport and its host framework.
//!
//! The transport never opens sockets or talks to threads itself. The host
//! framework hands it one [`HostInterface`] per connection; the trait object
//! stands in for the socket descriptor of a classic C API. Below the
//! transport, `network_recv`/`network_send` move whole datagrams. Above it,
//! `app_recv`/`app_send` move stream bytes, and `unblock_application` /
//! `fin_received` deliver the two notifications the application cares about.

use std::ops::BitOr;
use std::time::Duration;

/// A set of the events the transport can block on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSet(u8);

impl EventSet {
    /// The empty set. Returned from a wait to signal a timeout.
    pub const NONE: EventSet = EventSet(0);
    /// The application has bytes queued for transmission.
    pub const APP_DATA: EventSet = EventSet(0x1);
    /// A datagram is waiting in the network layer.
    pub const NETWORK_DATA: EventSet = EventSet(0x2);
    /// The application asked to close its write stream.
    pub const APP_CLOSE_REQUESTED: EventSet = EventSet(0x4);
    /// Everything at once.
    pub const ANY_EVENT: EventSet = EventSet(0x7);

    pub fn contains(self, other: EventSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// This set with the given events masked out.
    pub fn without(self, other: EventSet) -> EventSet {
        EventSet(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventSet {
    type Output = EventSet;

    fn bitor(self, rhs: EventSet) -> EventSet {
        EventSet(self.0 | rhs.0)
    }
}

/// The services the host framework provides to one connection.
///
/// All methods are synchronous. [`wait_for_event`](Self::wait_for_event) is
/// the only one that may block; the rest must complete immediately with
/// whatever is already buffered.
pub trait HostInterface {
    /// The largest payload the network layer will carry in one datagram.
    fn mss(&self) -> usize;

    /// A monotonic clock with nanosecond resolution. The zero point is
    /// arbitrary but fixed for the life of the connection.
    fn now(&mut self) -> Duration;

    /// Blocks until one of the events in `mask` is ready or, if a deadline
    /// is given, until the clock passes it. Returns the subset of `mask`
    /// that fired, or [`EventSet::NONE`] on timeout.
    fn wait_for_event(&mut self, mask: EventSet, deadline: Option<Duration>) -> EventSet;

    /// Receives one whole datagram into `buf` and returns its length. Only
    /// called after a wait reported [`EventSet::NETWORK_DATA`].
    fn network_recv(&mut self, buf: &mut [u8]) -> usize;

    /// Hands one datagram, header and payload, to the network layer.
    fn network_send(&mut self, header: &[u8], payload: &[u8]);

    /// Takes up to `buf.len()` bytes the application has queued for
    /// sending. Only called after a wait reported [`EventSet::APP_DATA`].
    fn app_recv(&mut self, buf: &mut [u8]) -> usize;

    /// Delivers in-order stream bytes to the application.
    fn app_send(&mut self, data: &[u8]);

    /// Releases the application thread blocked in connect or accept.
    fn unblock_application(&mut self);

    /// Tells the application that the peer has finished writing. Called
    /// exactly once per connection, after every preceding byte has been
    /// delivered through [`app_send`](Self::app_send).
    fn fin_received(&mut self);
}
