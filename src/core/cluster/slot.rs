// src/core/cluster/slot.rs

//! Implements the cluster hash slot algorithm and the key hash used for routing.

use crc::{CRC_16_XMODEM, CRC_32_ISO_HDLC, Crc};

/// The total number of hash slots in the cluster.
pub const NUM_SLOTS: usize = 16384;

/// The CRC16 variant Redis Cluster uses for hash slots.
const CRC16_ALGO: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// The CRC32 algorithm used for key hashes and locker shards.
const CRC32_ALGO: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Returns the hash tag of a key, the non-empty substring between the first
/// `{` and the next `}`. Keys without a valid tag are returned whole.
///
/// This allows users to force multiple keys onto the same slot, e.g.
/// `user:{123}:name` and `user:{123}:email`.
pub fn hash_tag(key: &[u8]) -> &[u8] {
    if let Some(start) = key.iter().position(|&b| b == b'{')
        && let Some(end_offset) = key[start + 1..].iter().position(|&b| b == b'}')
        && end_offset > 0
    {
        return &key[start + 1..start + 1 + end_offset];
    }
    key
}

/// The routing hash of a key: CRC32 over its hash tag.
pub fn key_hash(key: &[u8]) -> u32 {
    CRC32_ALGO.checksum(hash_tag(key))
}

/// CRC32 over the whole key, ignoring hash tags.
pub(crate) fn crc32(data: &[u8]) -> u32 {
    CRC32_ALGO.checksum(data)
}

/// Calculates the hash slot for a given key: `CRC16(tag) % NUM_SLOTS`.
pub fn get_slot(key: &[u8]) -> u16 {
    CRC16_ALGO.checksum(hash_tag(key)) % (NUM_SLOTS as u16)
}
