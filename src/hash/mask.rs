//! Hash utilities: the FNV-1a digest used to key the hash backend's single
//! chained table (§4.4 "Hash function"). Prefix masking itself lives on
//! [`crate::types::af::AddressFamily::masked`]; this module only has the
//! digest, kept in a file of its own the way `rotonda-store` keeps small,
//! single-purpose numeric helpers (`synth_int.rs`) separate from its
//! larger structural modules.

/// 32-bit FNV-1a over `bytes` followed by the `prefix_length` byte,
/// producing a deterministic, avalanching digest (§4.4). The original
/// `lpmht` C implementation offers a hardware CRC32 alternative behind a
/// compile-time toggle (`hash-internal.h`); this crate sticks to FNV-1a
/// since only a deterministic, avalanching 32-bit hash is required here,
/// not a specific algorithm.
pub fn fnv1a_prefix_hash(bytes: &[u8], prefix_length: u8) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash ^= prefix_length as u32;
    hash.wrapping_mul(FNV_PRIME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_avalanching() {
        let a = fnv1a_prefix_hash(&[10, 0, 0, 0], 8);
        let b = fnv1a_prefix_hash(&[10, 0, 0, 0], 8);
        assert_eq!(a, b);
        let c = fnv1a_prefix_hash(&[10, 0, 0, 1], 8);
        assert_ne!(a, c);
    }
}
