//! Fixed-width binary layout for [`MiningRecord`].
//!
//! Three big-endian `u64` words: last mine time (bit pattern of the signed
//! timestamp), total mined, mine count. There is no version byte; changing
//! the layout breaks every stored record.

use crate::models::MiningRecord;

pub const RECORD_LEN: usize = 24;

pub fn encode(record: &MiningRecord) -> [u8; RECORD_LEN] {
    let mut out = [0u8; RECORD_LEN];
    out[0..8].copy_from_slice(&(record.last_mine_time as u64).to_be_bytes());
    out[8..16].copy_from_slice(&record.total_mined.to_be_bytes());
    out[16..24].copy_from_slice(&record.mine_count.to_be_bytes());
    out
}

/// Returns `None` for anything shorter than [`RECORD_LEN`]. Trailing bytes are ignored.
pub fn decode(bytes: &[u8]) -> Option<MiningRecord> {
    if bytes.len() < RECORD_LEN {
        return None;
    }
    Some(MiningRecord {
        last_mine_time: read_u64(bytes, 0) as i64,
        total_mined: read_u64(bytes, 8),
        mine_count: read_u64(bytes, 16),
    })
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_be_bytes(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_record() {
        let record = MiningRecord {
            last_mine_time: 1_700_000_000,
            total_mined: 300_000_000,
            mine_count: 3,
        };
        assert_eq!(decode(&encode(&record)), Some(record));
    }

    #[test]
    fn layout_is_big_endian_words() {
        let record = MiningRecord {
            last_mine_time: 1000,
            total_mined: 100_000_000,
            mine_count: 1,
        };
        let bytes = encode(&record);
        assert_eq!(&bytes[0..8], &[0, 0, 0, 0, 0, 0, 0x03, 0xe8]);
        assert_eq!(&bytes[8..16], &[0, 0, 0, 0, 0x05, 0xf5, 0xe1, 0x00]);
        assert_eq!(&bytes[16..24], &[0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn short_input_is_absent() {
        let bytes = encode(&MiningRecord::default());
        for len in 0..RECORD_LEN {
            assert_eq!(decode(&bytes[..len]), None, "len {}", len);
        }
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let record = MiningRecord {
            last_mine_time: 5,
            total_mined: 6,
            mine_count: 7,
        };
        let mut bytes = encode(&record).to_vec();
        bytes.extend_from_slice(b"junk");
        assert_eq!(decode(&bytes), Some(record));
    }

    #[test]
    fn negative_time_keeps_its_bit_pattern() {
        let record = MiningRecord {
            last_mine_time: -1,
            total_mined: u64::MAX,
            mine_count: u64::MAX,
        };
        let bytes = encode(&record);
        assert!(bytes.iter().all(|b| *b == 0xff));
        assert_eq!(decode(&bytes), Some(record));
    }
}
