//! Fixed-point reciprocal of an element stride.
//!
//! Converting a byte distance into an element count divides by the element
//! size on every size, capacity, and iterator-distance computation. Those
//! divisions sit on hot paths, so the descriptor precomputes a multiplicative
//! inverse once at definition time and every later division becomes a widening
//! multiply plus a shift.
//!
//! # Encoding
//!
//! A [`Reciprocal`] is a `(magic, shift)` pair with three encodings:
//!
//! - power-of-two stride `d = 2^k` (including 1): `magic == 0`, `shift == k`,
//!   and division is a plain right shift;
//! - stride above `isize::MAX`: `magic == 0`, `shift == u8::MAX`, and division
//!   falls back to the hardware instruction (no valid magic exists; validated
//!   element sizes never take this path);
//! - everything else: `floor(n / d) == hi(n * magic) >> shift`, where `hi`
//!   takes the upper machine word of the double-width product.
//!
//! # Construction
//!
//! For a stride `d` with an odd factor, the constructor scans candidate shifts
//! `s = 0, 1, 2, ...` while maintaining the running quotient/remainder pair of
//! `2^(W+s) / d` (`W` = pointer width), doubling the pair to move from one `s`
//! to the next. The candidate magic is the ceiling quotient `q + 1`, whose
//! absolute error is `e = d - r`. Once `e < 2^(s+1)` the product error
//! `n * e / 2^(W+s)` stays below one for every `n <= 2^(W-1)`, making the
//! multiply-shift exact over the whole domain of byte counts (and of
//! `isize::MIN.unsigned_abs()`, which the signed helper needs). The loop always
//! terminates with `s <= W - 2` and a magic that fits in one machine word:
//! while the bound still fails, `d >= 2^(s+1)`, which caps the next quotient
//! below `2^W`.
//!
//! The widening multiply is the only width-sensitive operation; [`Wide`]
//! selects `u128` or `u64` from `target_pointer_width`.

/// Double-width unsigned integer used for the widening multiply.
#[cfg(target_pointer_width = "64")]
type Wide = u128;

/// Double-width unsigned integer used for the widening multiply.
#[cfg(target_pointer_width = "32")]
type Wide = u64;

/// Shift value marking a stride too large to have a valid magic.
const DEGENERATE: u8 = u8::MAX;

/// Precomputed multiplicative inverse of an element stride.
///
/// The pair is meaningful only together with the stride it was computed for;
/// the division helpers take that stride as an explicit argument and yield
/// unspecified (but not undefined) results if handed a different one.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Reciprocal {
    /// Magic multiplier, or `0` for the shift-only and degenerate encodings.
    magic: usize,
    /// Post-multiply shift, `log2(d)` for power-of-two strides, or
    /// [`DEGENERATE`].
    shift: u8,
}

impl Reciprocal {
    /// Computes the reciprocal of `divisor`.
    ///
    /// `divisor` must be nonzero. Strides above `isize::MAX` produce the
    /// degenerate encoding, for which [`Reciprocal::divide`] falls back to
    /// hardware division.
    pub const fn compute(divisor: usize) -> Self {
        debug_assert!(divisor != 0);
        if divisor.is_power_of_two() {
            return Self {
                magic: 0,
                shift: divisor.trailing_zeros() as u8,
            };
        }
        if divisor > isize::MAX as usize {
            return Self {
                magic: 0,
                shift: DEGENERATE,
            };
        }

        let w = usize::BITS;
        // Running pair (q, r) = divmod(2^(W+s), divisor), seeded from
        // 2^(W-1) so the intermediate values stay representable.
        let mut q = (1usize << (w - 1)) / divisor;
        let mut r = (1usize << (w - 1)) % divisor;
        // The seed covered 2^(W-1); one doubling reaches 2^W for s = 0.
        let doubled = r << 1;
        q = (q << 1) | (doubled >= divisor) as usize;
        r = doubled % divisor;
        let mut s = 0u8;
        loop {
            let error = divisor - r;
            if error < (1usize << (s + 1)) {
                break;
            }
            s += 1;
            let doubled = r << 1;
            q = (q << 1) | (doubled >= divisor) as usize;
            r = doubled % divisor;
        }
        Self {
            magic: q + 1,
            shift: s,
        }
    }

    /// Returns `n / divisor` using the precomputed constants.
    ///
    /// `divisor` must be the stride this reciprocal was computed for, and for
    /// the multiply encoding `n` must not exceed `2^(W-1)` (every byte count
    /// the containers produce satisfies this).
    #[inline]
    pub const fn divide(self, n: usize, divisor: usize) -> usize {
        debug_assert!(divisor != 0);
        match (self.magic, self.shift) {
            (0, DEGENERATE) => n / divisor,
            (0, shift) => n >> shift,
            (magic, shift) => {
                debug_assert!(n <= (isize::MAX as usize) + 1);
                let product = (n as Wide) * (magic as Wide);
                ((product >> usize::BITS) as usize) >> shift
            }
        }
    }

    /// Returns `n % divisor`, derived from the quotient.
    #[inline]
    pub const fn remainder(self, n: usize, divisor: usize) -> usize {
        n - self.divide(n, divisor) * divisor
    }

    /// Returns `n / divisor` for a signed `n`, dividing the absolute value and
    /// re-applying the sign.
    #[inline]
    pub const fn divide_signed(self, n: isize, divisor: usize) -> isize {
        let quotient = self.divide(n.unsigned_abs(), divisor);
        if n < 0 {
            quotient.wrapping_neg() as isize
        } else {
            quotient as isize
        }
    }

    /// Whether this is the degenerate encoding without a valid magic.
    #[inline]
    pub const fn is_degenerate(self) -> bool {
        self.magic == 0 && self.shift == DEGENERATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_values(divisor: usize) -> [usize; 12] {
        // Domain of the multiply encoding is n <= 2^(W-1), so clamp the
        // derived probes to it.
        let half = (isize::MAX as usize) + 1;
        [
            0,
            1,
            divisor - 1,
            divisor,
            divisor.saturating_add(1).min(half),
            divisor.saturating_mul(2).saturating_add(1).min(half),
            12345,
            1 << 20,
            (isize::MAX as usize) / 3,
            (isize::MAX as usize) - 1,
            isize::MAX as usize,
            half,
        ]
    }

    #[test]
    fn exhaustive_small_divisors() {
        for divisor in 1..=1024usize {
            let recip = Reciprocal::compute(divisor);
            for n in probe_values(divisor) {
                assert_eq!(recip.divide(n, divisor), n / divisor, "n={n} d={divisor}");
                assert_eq!(
                    recip.remainder(n, divisor),
                    n % divisor,
                    "n={n} d={divisor}"
                );
            }
        }
    }

    #[test]
    fn awkward_divisors() {
        let divisors = [
            3usize,
            7,
            641,
            6700417,
            (1 << 21) - 19,
            (isize::MAX as usize) / 2,
            (isize::MAX as usize) - 24,
            isize::MAX as usize,
        ];
        for divisor in divisors {
            let recip = Reciprocal::compute(divisor);
            for n in probe_values(divisor) {
                assert_eq!(recip.divide(n, divisor), n / divisor, "n={n} d={divisor}");
            }
        }
    }

    #[test]
    fn power_of_two_strides_divide_by_shift() {
        for k in 0..usize::BITS {
            let divisor = 1usize << k;
            let recip = Reciprocal::compute(divisor);
            assert!(!recip.is_degenerate());
            assert_eq!(recip.magic, 0);
            assert_eq!(recip.shift as u32, k);
            assert_eq!(recip.divide(usize::MAX, divisor), usize::MAX >> k);
        }
    }

    #[test]
    fn degenerate_strides_fall_back_to_hardware_division() {
        let divisor = (isize::MAX as usize) + 3;
        let recip = Reciprocal::compute(divisor);
        assert!(recip.is_degenerate());
        assert_eq!(recip.divide(divisor - 1, divisor), 0);
        assert_eq!(recip.divide(divisor, divisor), 1);
        assert_eq!(recip.divide(usize::MAX, divisor), usize::MAX / divisor);
    }

    #[test]
    fn signed_division_preserves_sign() {
        let recip = Reciprocal::compute(12);
        assert_eq!(recip.divide_signed(144, 12), 12);
        assert_eq!(recip.divide_signed(-144, 12), -12);
        assert_eq!(recip.divide_signed(-145, 12), -12);
        assert_eq!(recip.divide_signed(0, 12), 0);
        assert_eq!(recip.divide_signed(isize::MIN, 1), isize::MIN);

        let recip = Reciprocal::compute(7);
        assert_eq!(recip.divide_signed(isize::MIN, 7), isize::MIN / 7);
        assert_eq!(recip.divide_signed(isize::MAX, 7), isize::MAX / 7);
    }

    #[test]
    fn usable_in_const_context() {
        const TWELVE: Reciprocal = Reciprocal::compute(12);
        assert_eq!(TWELVE.divide(132, 12), 11);
    }
}
