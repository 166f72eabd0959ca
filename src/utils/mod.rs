//! Small stateless helpers
//!
//! Bit and byte manipulation, packed BCD, CRC-32, a Galois LFSR, and
//! GCD. Everything here is a pure function except the LFSR and the
//! incremental CRC, which carry their own small state.

mod bcd;
mod bits;
mod crc;
mod gcd;
mod lfsr;

pub use bcd::{from_bcd, from_bcd32, to_bcd, to_bcd32};
pub use bits::{
    betoh16, betoh32, betoh64, find_zero_byte, htobe16, htobe32, htobe64, htole16, htole32,
    htole64, letoh16, letoh32, letoh64, reverse_bits32, reverse_bits64, swap_bytes16,
    swap_bytes32, swap_bytes64,
};
pub use crc::{crc32, Crc32};
pub use gcd::{extended_gcd, gcd};
pub use lfsr::Lfsr;
