//! Log record types and serialization.

use crate::error::{CoreError, CoreResult};
use crate::types::{Key, Timestamp, Value, MAX_KEY_LEN, MAX_VALUE_LEN};
use thiserror::Error;

/// Size of the timestamp field.
pub const TIMESTAMP_SIZE: usize = 8;
/// Size of the operation field.
pub const OPERATION_SIZE: usize = 1;
/// Size of the key length field.
pub const KEY_LEN_SIZE: usize = 2;
/// Size of the value length field.
pub const VALUE_LEN_SIZE: usize = 4;
/// Size of the trailing checksum.
pub const CHECKSUM_SIZE: usize = 4;

/// Bytes before the key: timestamp (8) + operation (1) + key length (2).
pub const PREFIX_SIZE: usize = TIMESTAMP_SIZE + OPERATION_SIZE + KEY_LEN_SIZE;

/// Fixed bytes of every record, excluding key and value.
pub const RECORD_OVERHEAD: usize = PREFIX_SIZE + VALUE_LEN_SIZE + CHECKSUM_SIZE;

/// Mutation recorded by a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    /// Insert or overwrite a key.
    Set = 1,
    /// Remove a key.
    Delete = 2,
}

impl Operation {
    /// Converts a byte to an operation.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Set),
            2 => Some(Self::Delete),
            _ => None,
        }
    }

    /// Converts the operation to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Lower-case name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Delete => "delete",
        }
    }
}

/// Why a byte range could not be decoded as a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes are available than the record's declared lengths require.
    #[error("truncated record: need {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the record needs.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The stored checksum does not match the record contents.
    #[error("checksum mismatch: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum read from the record.
        stored: u32,
        /// Checksum computed over the record.
        computed: u32,
    },

    /// The checksum matched but the operation byte is not known.
    #[error("unknown operation {0}")]
    UnknownOperation(u8),

    /// The checksum matched but the record has no key.
    #[error("record has an empty key")]
    EmptyKey,
}

/// One durable log entry.
///
/// On-disk layout (all integers little-endian):
///
/// ```text
/// | timestamp i64 (8) | op (1) | key_len u16 (2) | key | value_len u32 (4) | value | crc32 (4) |
/// ```
///
/// The CRC32 (IEEE) covers `timestamp ‖ op ‖ key ‖ value`; the length fields
/// are not included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// When the record was created.
    pub timestamp: Timestamp,
    /// The mutation.
    pub operation: Operation,
    /// Affected key.
    pub key: Key,
    /// New value; empty for deletes.
    pub value: Value,
}

impl LogRecord {
    /// Creates a Set record stamped with the current time.
    #[must_use]
    pub fn set(key: Key, value: Value) -> Self {
        Self {
            timestamp: Timestamp::now(),
            operation: Operation::Set,
            key,
            value,
        }
    }

    /// Creates a Delete record stamped with the current time.
    #[must_use]
    pub fn delete(key: Key) -> Self {
        Self {
            timestamp: Timestamp::now(),
            operation: Operation::Delete,
            key,
            value: Vec::new(),
        }
    }

    /// Replaces the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Computes the record checksum.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        compute_checksum(self.timestamp, self.operation.as_byte(), &self.key, &self.value)
    }

    /// Size of this record when serialized.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        RECORD_OVERHEAD + self.key.len() + self.value.len()
    }

    /// Serializes the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or value exceeds its length field.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Serializes the record, appending to `buf`.
    ///
    /// `buf` is left unchanged on error.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or value exceeds its length field.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> CoreResult<()> {
        let operation = self.operation.name();
        let key_len = u16::try_from(self.key.len()).map_err(|_| CoreError::KeyTooLong {
            operation,
            len: self.key.len(),
            max: MAX_KEY_LEN,
        })?;
        let value_len = u32::try_from(self.value.len()).map_err(|_| CoreError::ValueTooLarge {
            operation,
            key: crate::error::KeyDisplay::new(&self.key),
            len: self.value.len(),
            max: MAX_VALUE_LEN,
        })?;

        buf.reserve(self.encoded_len());
        buf.extend_from_slice(&self.timestamp.as_nanos().to_le_bytes());
        buf.push(self.operation.as_byte());
        buf.extend_from_slice(&key_len.to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&value_len.to_le_bytes());
        buf.extend_from_slice(&self.value);
        buf.extend_from_slice(&self.checksum().to_le_bytes());
        Ok(())
    }

    /// Decodes one record from the start of `data`.
    ///
    /// Returns the record and the number of bytes it occupied. Trailing bytes
    /// after the record are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the record is truncated, fails its
    /// checksum, carries an unknown operation or has an empty key.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), DecodeError> {
        let total = frame_len(data)?;
        if data.len() < total {
            return Err(DecodeError::Truncated {
                needed: total,
                available: data.len(),
            });
        }

        let key_len = read_key_len(data);
        let key_start = PREFIX_SIZE;
        let key_end = key_start + key_len;
        let value_start = key_end + VALUE_LEN_SIZE;
        let value_end = total - CHECKSUM_SIZE;

        let timestamp = Timestamp::from_nanos(i64::from_le_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ]));
        let op_byte = data[TIMESTAMP_SIZE];
        let key = &data[key_start..key_end];
        let value = &data[value_start..value_end];
        let stored = u32::from_le_bytes([
            data[value_end],
            data[value_end + 1],
            data[value_end + 2],
            data[value_end + 3],
        ]);

        let computed = compute_checksum(timestamp, op_byte, key, value);
        if stored != computed {
            return Err(DecodeError::ChecksumMismatch { stored, computed });
        }

        let operation = Operation::from_byte(op_byte).ok_or(DecodeError::UnknownOperation(op_byte))?;
        if key.is_empty() {
            return Err(DecodeError::EmptyKey);
        }

        Ok((
            Self {
                timestamp,
                operation,
                key: key.to_vec(),
                value: value.to_vec(),
            },
            total,
        ))
    }
}

/// Reads the key length from a buffer holding at least [`PREFIX_SIZE`] bytes.
pub(crate) fn read_key_len(data: &[u8]) -> usize {
    u16::from_le_bytes([data[TIMESTAMP_SIZE + 1], data[TIMESTAMP_SIZE + 2]]) as usize
}

/// Reads the value length from a buffer holding the record through that field.
pub(crate) fn read_value_len(data: &[u8], key_len: usize) -> usize {
    let at = PREFIX_SIZE + key_len;
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as usize
}

/// Returns the full encoded length of the record starting at `data[0]`.
///
/// Needs only the bytes up to and including the value length field.
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`] if even the length fields are cut off.
pub fn frame_len(data: &[u8]) -> Result<usize, DecodeError> {
    if data.len() < PREFIX_SIZE {
        return Err(DecodeError::Truncated {
            needed: PREFIX_SIZE,
            available: data.len(),
        });
    }
    let key_len = read_key_len(data);
    let through_value_len = PREFIX_SIZE + key_len + VALUE_LEN_SIZE;
    if data.len() < through_value_len {
        return Err(DecodeError::Truncated {
            needed: through_value_len,
            available: data.len(),
        });
    }
    let value_len = read_value_len(data, key_len);
    Ok(through_value_len + value_len + CHECKSUM_SIZE)
}

/// Computes the CRC32 (IEEE) of `timestamp ‖ op ‖ key ‖ value`.
#[must_use]
pub fn compute_checksum(timestamp: Timestamp, op: u8, key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&timestamp.as_nanos().to_le_bytes());
    hasher.update(&[op]);
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}
