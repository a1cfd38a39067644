//! Modular arithmetic over 32-bit sequence numbers.
//!
//! Sequence numbers wrap at 2^32, so raw magnitude comparisons are never
//! sound. Every window check in the transport goes through [`seq_in`];
//! queue ordering goes through [`seq_lt`].

/// Whether `seq` lies in the closed interval `[start, end]`, where the
/// interval may wrap around the end of the sequence space.
pub fn seq_in(seq: u32, start: u32, end: u32) -> bool {
    if start <= end {
        seq >= start && seq <= end
    } else {
        seq >= start || seq <= end
    }
}

/// `a < b` under modular arithmetic.
///
/// Sound whenever `a` and `b` lie within half the sequence ring of each
/// other, which holds for everything the transport orders: live sequence
/// numbers all fall within one window of the current base.
pub fn seq_lt(a: u32, b: u32) -> bool {
    // k is on the opposite side of the ring of integers mod 2^32 from b
    let k = b.wrapping_add(u32::MAX / 2);

    // There are six cases:
    //  0123456789
    // |a b    k  | a<b, a<k, b<k -> a<b
    // |a k    b  | a<b, a<k, b>k -> a>b
    // |  b a  k  | a>b, a<k, b<k -> a>b
    // |  k a  b  | a<b, a>k, b>k -> a<b
    // |  b    k a| a>b, a>k, b<k -> a<b
    // |  k    b a| a>b, a>k, b>k -> a>b

    (a < b) ^ (a < k) ^ (b < k)
}
