/// The state of one STCP connection. Unlike full TCP there is no RST, no
/// simultaneous open, and no TIME_WAIT: the last acknowledgment is trusted
/// to arrive, so both ends of a teardown finish in CLOSED. The machine is
/// described by the diagram below.
///
/// ```text
///                        +---------+ ---------\      active OPEN
///                        |  CLOSED |            \    -----------
///                        +---------+              \    snd SYN
///             passive OPEN |     ^                  \
///             ------------ |     | event loop         \
///                          |     | returns              \
///                          V     |                        V
///                        +---------+                 +----------+
///                        |  LISTEN |                 | SYN_SENT |
///                        +---------+                 +----------+
///                rcv SYN   |                              |  rcv SYN,ACK
///             -----------  |                              |  ------------
///             snd SYN,ACK  |                              |  snd ACK
///                          V                              V
///             +----------+      rcv ACK of SYN      +-------------+
///             | SYN_RCVD |------------------------->| ESTABLISHED |
///             +----------+                          +-------------+
///                                        CLOSE        |         |  rcv FIN
///                                       -------       |         |  -------
///                                       snd FIN       |         |  snd ACK
///                              +----------------------+         +--------------+
///                              V                                               V
///                        +-----------+  rcv FIN                         +------------+
///                        | FIN_WAIT_1|--------------\                   | CLOSE_WAIT |
///                        +-----------+  snd ACK      \                  +------------+
///                              | rcv ACK of FIN       \                    |  CLOSE
///                              | --------------        \                   | -------
///                              V        x               V                  | snd FIN
///                        +-----------+            +---------+              V
///                        | FIN_WAIT_2|            | CLOSING |         +----------+
///                        +-----------+            +---------+         | LAST_ACK |
///                              | rcv FIN               |              +----------+
///                              | -------               | rcv ACK          | rcv ACK
///                              | snd ACK               | of FIN           | of FIN
///                              V                       V                  V
///                              \------------------> CLOSED <--------------/
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// No connection. The starting state, and the state the teardown paths
    /// converge on.
    Closed,
    /// Waiting for a connection request after a passive open.
    Listen,
    /// Waiting for a matching connection request acknowledgment after
    /// having sent a connection request.
    SynSent,
    /// Waiting for the acknowledgment of the connection request sent in
    /// reply to the one received.
    SynReceived,
    /// An open connection; the normal state for the data transfer phase.
    Established,
    /// Our FIN is in flight; waiting for its acknowledgment or for the
    /// remote side's own termination request.
    FinWait1,
    /// Our FIN is acknowledged; waiting for the remote side's termination
    /// request.
    FinWait2,
    /// Both sides requested termination at once; waiting for the
    /// acknowledgment of our FIN.
    Closing,
    /// The remote side finished writing; waiting for the local application
    /// to close.
    CloseWait,
    /// Waiting for the acknowledgment of the FIN that answered the remote
    /// side's termination request.
    LastAck,
}
