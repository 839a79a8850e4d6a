//! Integer domains for the IDL numeric tags.
//!
//! Below 53 bits a number is truncated toward zero and reduced modulo
//! `2^bits`, folding into the negative range for signed domains. At 53 bits
//! and above the host cannot represent every integer, so the value is clamped
//! to the safe-integer range instead of wrapped.

/// Largest integer a double represents exactly, `2^53 - 1`.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Width at which wraparound gives way to clamping.
const SAFE_INTEGER_BITS: u32 = 53;

/// An integer domain: bit width and signedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegerDomain {
    /// Width in bits.
    pub bits: u32,
    /// Whether the domain includes negative values.
    pub signed: bool,
}

impl IntegerDomain {
    /// `byte`: 8-bit signed.
    pub const BYTE: Self = Self::new(8, true);
    /// `octet`: 8-bit unsigned.
    pub const OCTET: Self = Self::new(8, false);
    /// `short`: 16-bit signed.
    pub const SHORT: Self = Self::new(16, true);
    /// `unsigned short`: 16-bit unsigned.
    pub const UNSIGNED_SHORT: Self = Self::new(16, false);
    /// `long`: 32-bit signed.
    pub const LONG: Self = Self::new(32, true);
    /// `unsigned long`: 32-bit unsigned.
    pub const UNSIGNED_LONG: Self = Self::new(32, false);
    /// `long long`: 64-bit signed, clamped.
    pub const LONG_LONG: Self = Self::new(64, true);
    /// `unsigned long long`: 64-bit unsigned, clamped.
    pub const UNSIGNED_LONG_LONG: Self = Self::new(64, false);

    /// Create a domain.
    #[must_use]
    pub const fn new(bits: u32, signed: bool) -> Self {
        Self { bits, signed }
    }

    /// Coerce a number into this domain.
    ///
    /// Returns `None` for NaN and infinities.
    #[must_use]
    pub fn coerce(self, x: f64) -> Option<f64> {
        if !x.is_finite() {
            return None;
        }
        let t = x.trunc();

        // `+ 0.0` turns a negative zero into zero.
        if self.bits >= SAFE_INTEGER_BITS {
            let low = if self.signed { -MAX_SAFE_INTEGER } else { 0.0 };
            return Some(t.clamp(low, MAX_SAFE_INTEGER) + 0.0);
        }

        let modulus = 2_f64.powi(self.bits_i32());
        let reduced = t.rem_euclid(modulus);
        if self.signed && reduced >= modulus / 2.0 {
            Some(reduced - modulus)
        } else {
            Some(reduced + 0.0)
        }
    }

    /// Whether `x` already lies in this domain, i.e. coercion leaves it unchanged.
    #[must_use]
    pub fn holds(self, x: f64) -> bool {
        self.coerce(x) == Some(x)
    }

    #[allow(clippy::cast_possible_wrap)]
    const fn bits_i32(self) -> i32 {
        self.bits as i32
    }
}
