//! A user-space implementation of STCP, a simplified Transmission Control
//! Protocol in the style of [RFC 793](https://www.rfc-editor.org/rfc/rfc793).
//! STCP delivers in-order, deduplicated, flow-controlled byte streams over a
//! lossy, reordering datagram channel. Relative to full TCP it has a fixed
//! window, no congestion control beyond exponential timer backoff, no RST,
//! no selective acknowledgement, and no header options.
//!
//! # Organization
//!
//! - [`Context`] holds the per-connection state: the ten-state connection
//!   machine, the send and receive sequence spaces, the retransmission and
//!   reassembly queues, and the adaptive retransmission timer.
//! - [`HostInterface`] is the boundary to the host framework. The host owns
//!   the datagram channel below the transport and the application byte
//!   streams above it; the transport only ever touches either through this
//!   trait.
//! - [`run`] drives one connection from open to close on the caller's
//!   thread, blocking in [`HostInterface::wait_for_event`] between events.
//!
//! # Concurrency
//!
//! One connection is one cooperative, single-threaded event loop. There is
//! no internal locking and no suspension point other than the host's wait
//! primitive, so every invariant on the sequence spaces is re-established
//! before each block.

pub mod context;
pub mod host;
pub mod wire;

pub use context::{
    run, Context, Role, RtoEstimator, Segment, SegmentQueue, State, TransportError, INIT_RTO,
    INITIAL_SEQUENCE_NUMBER, MAX_RTO, MAX_TRANSMISSIONS, MIN_RTO, WINDOW_SIZE,
};
pub use host::{EventSet, HostInterface};
pub use wire::{Control, StcpHeader, WireError};
