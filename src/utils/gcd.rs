//! Greatest common divisor, plain and extended

use crate::error::{QuadixError, Result};

/// Euclid's algorithm; `gcd(0, 0)` is 0.
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Extended Euclid: returns `(g, s, t)` with `b * t - a * s == g`.
///
/// `b` must be nonzero; the identity has no non-negative solution
/// otherwise.
pub fn extended_gcd(a: u64, b: u64) -> Result<(u64, u64, u64)> {
    if b == 0 {
        return Err(QuadixError::invalid_argument(
            "extended gcd requires b != 0",
        ));
    }

    // Signed Bezout pass: old_s * a + old_t * b == g
    let (mut old_r, mut r) = (a as i128, b as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    let (mut old_t, mut t) = (0i128, 1i128);
    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_s, s) = (s, old_s - q * s);
        (old_t, t) = (t, old_t - q * t);
    }
    let g = old_r;

    // Shift the solution so the a-coefficient is non-positive (and the
    // b-coefficient therefore non-negative), then read both off unsigned
    let (mut x, mut y) = (old_s, old_t);
    if x > 0 {
        let bq = (b as i128) / g;
        let aq = (a as i128) / g;
        let k = (x + bq - 1) / bq;
        x -= k * bq;
        y += k * aq;
    }
    debug_assert!(x <= 0 && y >= 0);
    Ok((g as u64, (-x) as u64, y as u64))
}
