use std::fmt;

use rand::Rng;

/// A 48-bit hardware address, displayed lower-case and colon separated (`00:1a:2b:3c:4d:5e`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(u64);

impl MacAddr {
    /// The largest representable address, `ff:ff:ff:ff:ff:ff`.
    pub const MAX: u64 = 0xFFFF_FFFF_FFFF;

    /// Lower bound of the range random addresses are drawn from.
    const RANDOM_MIN: u64 = 1000;

    /// Creates an address from the low 48 bits of `bits`.
    #[inline]
    pub const fn new(bits: u64) -> Self {
        Self(bits & Self::MAX)
    }

    /// Draws a random unicast, globally administered address.
    ///
    /// The multicast bit and the locally administered bit both live in the first octet, which is
    /// cleared entirely. Uniqueness is all that's needed here, so any [`Rng`] will do.
    pub fn random_unicast<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let bits = rng.gen_range(Self::RANDOM_MIN..=Self::MAX);
        Self::new(bits & 0x00FF_FFFF_FFFF)
    }

    #[inline]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    pub fn octets(self) -> [u8; 6] {
        let b = self.0.to_be_bytes();
        [b[2], b[3], b[4], b[5], b[6], b[7]]
    }

    pub fn is_multicast(self) -> bool {
        self.octets()[0] & 0x01 != 0
    }

    pub fn is_locally_administered(self) -> bool {
        self.octets()[0] & 0x02 != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.octets();
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}
