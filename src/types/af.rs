//! The address family of an IP prefix, as a trait.
//!
//! Both backends are generic over [`AddressFamily`] so that the same trie
//! and hash code paths serve IPv4 (32-bit) and IPv6 (128-bit) prefixes
//! without duplicating logic, the way `rotonda-store`'s `AddressFamily`
//! trait (`types/af.rs`) drives its tree-bitmap code for both families.

use std::fmt::Debug;
use std::hash::Hash;
use std::net::IpAddr;

/// An IP address family, represented as its widest-fitting unsigned integer
/// (`u32` for IPv4, `u128` for IPv6), always interpreted as the big-endian
/// (network byte order) bit pattern of the address.
pub trait AddressFamily:
    Copy
    + Clone
    + Debug
    + Eq
    + Ord
    + Hash
    + std::ops::BitAnd<Output = Self>
    + Send
    + Sync
    + 'static
{
    /// Number of significant bits in this family (32 for IPv4, 128 for IPv6).
    const BITS: u8;

    /// Number of bytes in the wire representation (4 or 16).
    const BYTES: usize;

    fn zero() -> Self;

    /// The bit mask with the top `len` bits set and the rest clear.
    fn mask(len: u8) -> Self;

    /// Mask `self` down to its top `len` bits, clearing the rest.
    fn masked(self, len: u8) -> Self {
        self & Self::mask(len)
    }

    /// Construct from big-endian wire bytes (4 or 16 long).
    fn from_be_bytes(bytes: &[u8]) -> Self;

    /// Render as big-endian wire bytes (4 or 16 long).
    fn to_be_bytes(self) -> Vec<u8>;

    /// The top 24 bits, as used by the IPv4 rule-table index. Only
    /// meaningful for the IPv4 family.
    fn top_24(self) -> u32;

    /// The bit at position `i` (0 = most significant bit). Used by the trie
    /// backend to walk a prefix bit-by-bit, MSB first.
    fn bit_at(self, i: u8) -> bool;

    /// Widens to a `u128` for use as a uniform cache key (the IPv6 flow
    /// cache is keyed this way regardless of which family instantiates the
    /// generic hash backend; for IPv4 the value is simply never looked up
    /// since the flow cache is only ever constructed for IPv6 tables).
    fn as_u128(self) -> u128;

    /// Which [`Family`] this type implements, for [`crate::RouteTable::family`].
    const FAMILY: Family;
}

/// 32-bit IPv4 address family, stored as a big-endian `u32`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ipv4Family(pub u32);

impl std::ops::BitAnd for Ipv4Family {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl AddressFamily for Ipv4Family {
    const BITS: u8 = 32;
    const BYTES: usize = 4;

    fn zero() -> Self {
        Self(0)
    }

    fn mask(len: u8) -> Self {
        debug_assert!(len <= 32);
        if len == 0 {
            Self(0)
        } else {
            Self(u32::MAX << (32 - len))
        }
    }

    fn from_be_bytes(bytes: &[u8]) -> Self {
        Self(u32::from_be_bytes(bytes.try_into().expect("4 bytes")))
    }

    fn to_be_bytes(self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }

    fn top_24(self) -> u32 {
        self.0 >> 8
    }

    fn bit_at(self, i: u8) -> bool {
        debug_assert!(i < 32);
        (self.0 >> (31 - i)) & 1 == 1
    }

    fn as_u128(self) -> u128 {
        self.0 as u128
    }

    const FAMILY: Family = Family::V4;
}

/// 128-bit IPv6 address family, stored as a big-endian `u128`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ipv6Family(pub u128);

impl std::ops::BitAnd for Ipv6Family {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl AddressFamily for Ipv6Family {
    const BITS: u8 = 128;
    const BYTES: usize = 16;

    fn zero() -> Self {
        Self(0)
    }

    fn mask(len: u8) -> Self {
        debug_assert!(len <= 128);
        if len == 0 {
            Self(0)
        } else {
            Self(u128::MAX << (128 - len))
        }
    }

    fn from_be_bytes(bytes: &[u8]) -> Self {
        Self(u128::from_be_bytes(bytes.try_into().expect("16 bytes")))
    }

    fn to_be_bytes(self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }

    fn top_24(self) -> u32 {
        // Not meaningful for IPv6; the rule-table accelerator is IPv4-only.
        (self.0 >> (128 - 24)) as u32
    }

    fn bit_at(self, i: u8) -> bool {
        debug_assert!(i < 128);
        (self.0 >> (127 - i)) & 1 == 1
    }

    fn as_u128(self) -> u128 {
        self.0
    }

    const FAMILY: Family = Family::V6;
}

/// The IP family a table was created for, fixed at construction (§3,
/// "Route table instance").
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn max_len(self) -> u8 {
        match self {
            Family::V4 => 32,
            Family::V6 => 128,
        }
    }

    pub fn byte_len(self) -> usize {
        match self {
            Family::V4 => 4,
            Family::V6 => 16,
        }
    }
}

impl From<IpAddr> for Family {
    fn from(value: IpAddr) -> Self {
        match value {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }
}
