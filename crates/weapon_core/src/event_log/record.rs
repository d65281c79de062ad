//! On-disk record framing.
//!
//! A log file is a fixed header followed by framed records:
//!
//! ```text
//! file:   "WEAPONLG" | version (u16 LE)
//! record: magic "WREC" (4) | version (u16 LE) | type (1) | len (u32 LE) | header crc32 (u32 LE)
//!         | payload (CBOR) | crc32 (u32 LE)
//! ```
//!
//! The header CRC covers the eleven bytes before it, so a length that
//! overruns the file is trusted as a torn write only when the header that
//! claims it verifies. The trailing CRC covers everything before it.

use crate::checkpoint::SyncCheckpoint;
use crate::error::{LogError, LogResult};
use crate::event::Event;

/// Magic bytes opening every log file.
pub const FILE_MAGIC: [u8; 8] = *b"WEAPONLG";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the file header.
pub const FILE_HEADER_SIZE: usize = FILE_MAGIC.len() + 2;

/// Magic bytes opening every record.
const RECORD_MAGIC: [u8; 4] = *b"WREC";

/// magic (4) + version (2) + type (1) + length (4)
const HEADER_SIZE: usize = 11;

const CRC_SIZE: usize = 4;

/// Header plus its checksum; the payload starts here.
const PAYLOAD_START: usize = HEADER_SIZE + CRC_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RecordType {
    Event = 1,
    Checkpoint = 2,
}

impl RecordType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Event),
            2 => Some(Self::Checkpoint),
            _ => None,
        }
    }
}

/// One framed entry of the log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// A committed event.
    Event(Event),
    /// Sync progress for one backend.
    Checkpoint(SyncCheckpoint),
}

/// Result of decoding at some offset.
#[derive(Debug)]
pub enum Decoded {
    /// A complete, verified record spanning `len` bytes.
    Record {
        /// The record.
        record: LogRecord,
        /// Framed length in bytes.
        len: usize,
    },
    /// The remaining bytes are an incomplete record.
    TornTail,
}

impl LogRecord {
    fn record_type(&self) -> RecordType {
        match self {
            Self::Event(_) => RecordType::Event,
            Self::Checkpoint(_) => RecordType::Checkpoint,
        }
    }

    /// Serializes and frames the record.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Encode`] if the payload cannot be serialized or
    /// does not fit a 32-bit length.
    pub fn encode(&self) -> LogResult<Vec<u8>> {
        let mut payload = Vec::new();
        let encoded = match self {
            Self::Event(event) => ciborium::into_writer(event, &mut payload),
            Self::Checkpoint(checkpoint) => ciborium::into_writer(checkpoint, &mut payload),
        };
        encoded.map_err(|e| LogError::Encode(e.to_string()))?;

        let len = u32::try_from(payload.len())
            .map_err(|_| LogError::Encode("record payload too large".into()))?;

        let mut data = Vec::with_capacity(PAYLOAD_START + payload.len() + CRC_SIZE);
        data.extend_from_slice(&RECORD_MAGIC);
        data.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        data.push(self.record_type() as u8);
        data.extend_from_slice(&len.to_le_bytes());
        let header_crc = compute_crc32(&data);
        data.extend_from_slice(&header_crc.to_le_bytes());
        data.extend_from_slice(&payload);
        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }

    /// Decodes the record starting at the beginning of `buf`.
    ///
    /// `offset` is the absolute position of `buf` in the file, used only for
    /// error messages.
    ///
    /// # Errors
    ///
    /// Bad magic, an unknown type, a newer version, a checksum mismatch in
    /// the header or the body, and an undecodable payload are corruption.
    pub fn decode(buf: &[u8], offset: u64) -> LogResult<Decoded> {
        if buf.len() < PAYLOAD_START {
            return Ok(Decoded::TornTail);
        }
        if buf[0..4] != RECORD_MAGIC {
            return Err(LogError::corruption(offset, "invalid record magic"));
        }
        let stored = read_u32(buf, HEADER_SIZE);
        let actual = compute_crc32(&buf[..HEADER_SIZE]);
        if stored != actual {
            return Err(LogError::ChecksumMismatch {
                offset,
                expected: stored,
                actual,
            });
        }
        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version > FORMAT_VERSION {
            return Err(LogError::corruption(
                offset,
                format!("unsupported record version {version}"),
            ));
        }
        let record_type = RecordType::from_byte(buf[6]).ok_or_else(|| {
            LogError::corruption(offset, format!("unknown record type {}", buf[6]))
        })?;
        let len = read_u32(buf, 7) as usize;

        let body_end = PAYLOAD_START + len;
        let total = body_end + CRC_SIZE;
        if buf.len() < total {
            return Ok(Decoded::TornTail);
        }

        let stored = read_u32(buf, body_end);
        let actual = compute_crc32(&buf[..body_end]);
        if stored != actual {
            return Err(LogError::ChecksumMismatch {
                offset,
                expected: stored,
                actual,
            });
        }

        let payload = &buf[PAYLOAD_START..body_end];
        let record = match record_type {
            RecordType::Event => ciborium::from_reader(payload).map(Self::Event),
            RecordType::Checkpoint => ciborium::from_reader(payload).map(Self::Checkpoint),
        }
        .map_err(|e| LogError::corruption(offset, format!("undecodable payload: {e}")))?;

        Ok(Decoded::Record { record, len: total })
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Builds the file header.
#[must_use]
pub fn file_header() -> [u8; FILE_HEADER_SIZE] {
    let mut header = [0u8; FILE_HEADER_SIZE];
    header[..FILE_MAGIC.len()].copy_from_slice(&FILE_MAGIC);
    header[FILE_MAGIC.len()..].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    header
}

/// State of the bytes at the start of a log file.
#[derive(Debug, PartialEq, Eq)]
pub enum HeaderState {
    /// A complete, supported header.
    Valid,
    /// Empty, or a prefix of a header cut short by a crash.
    Torn,
}

/// Checks the file header.
///
/// # Errors
///
/// Foreign magic or a newer format version is corruption.
pub fn check_file_header(bytes: &[u8]) -> LogResult<HeaderState> {
    let expected = file_header();
    if bytes.len() < FILE_HEADER_SIZE {
        let magic_len = bytes.len().min(FILE_MAGIC.len());
        return if bytes[..magic_len] == FILE_MAGIC[..magic_len] {
            Ok(HeaderState::Torn)
        } else {
            Err(LogError::corruption(0, "not a weapon event log"))
        };
    }
    if bytes[..FILE_MAGIC.len()] != expected[..FILE_MAGIC.len()] {
        return Err(LogError::corruption(0, "not a weapon event log"));
    }
    let version = u16::from_le_bytes([bytes[FILE_MAGIC.len()], bytes[FILE_MAGIC.len() + 1]]);
    if version > FORMAT_VERSION {
        return Err(LogError::corruption(
            0,
            format!("log format version {version} is newer than supported {FORMAT_VERSION}"),
        ));
    }
    Ok(HeaderState::Valid)
}

const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// CRC-32 (IEEE) of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    let crc = data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        (crc >> 8) ^ CRC32_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize]
    });
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventPayload, Rating};
    use crate::types::{DeviceId, EventId, ItemKey, Timestamp};

    fn sample() -> LogRecord {
        LogRecord::Event(Event::new(
            EventId::new(DeviceId::from_bytes([3; 16]), 4),
            Timestamp::from_millis(99),
            EventPayload::Review {
                key: ItemKey::lexeme("perro"),
                rating: Rating::Hard,
            },
        ))
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn decode_reads_back_what_encode_wrote() {
        let bytes = sample().encode().unwrap();
        match LogRecord::decode(&bytes, 0).unwrap() {
            Decoded::Record { record, len } => {
                assert_eq!(record, sample());
                assert_eq!(len, bytes.len());
            }
            Decoded::TornTail => panic!("complete record reported torn"),
        }
    }

    #[test]
    fn every_strict_prefix_is_torn() {
        let bytes = sample().encode().unwrap();
        for cut in 0..bytes.len() {
            assert!(matches!(
                LogRecord::decode(&bytes[..cut], 0),
                Ok(Decoded::TornTail)
            ));
        }
    }

    #[test]
    fn flipped_payload_bit_is_checksum_error() {
        let mut bytes = sample().encode().unwrap();
        bytes[PAYLOAD_START + 2] ^= 0x01;
        assert!(matches!(
            LogRecord::decode(&bytes, 40),
            Err(LogError::ChecksumMismatch { offset: 40, .. })
        ));
    }

    #[test]
    fn inflated_length_is_checksum_error_not_torn() {
        let mut bytes = sample().encode().unwrap();
        bytes[10] ^= 0x01;
        assert!(matches!(
            LogRecord::decode(&bytes, 12),
            Err(LogError::ChecksumMismatch { offset: 12, .. })
        ));

        // even when the bogus length reaches past everything that follows
        bytes[10] = 0x7F;
        bytes.extend(sample().encode().unwrap());
        assert!(LogRecord::decode(&bytes, 12).is_err());
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut bytes = sample().encode().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            LogRecord::decode(&bytes, 0),
            Err(LogError::Corruption { .. })
        ));
    }

    #[test]
    fn header_states() {
        assert_eq!(check_file_header(&file_header()).unwrap(), HeaderState::Valid);
        assert_eq!(check_file_header(b"").unwrap(), HeaderState::Torn);
        assert_eq!(check_file_header(b"WEAP").unwrap(), HeaderState::Torn);
        assert!(check_file_header(b"SQLite format 3").is_err());
    }
}
