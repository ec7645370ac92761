//! Firmware image parsing and integrity validation.
//!
//! Image layout (all offsets fixed):
//!
//! ```text
//! [0..8)    magic, "VIALFW00" or "VIALFW01"
//! [8..16)   device UID
//! [16..24)  build timestamp, u64 LE unix seconds
//! [24..32)  reserved
//! [32..64)  SHA-256 of the payload
//! [64..]    payload, zero-padded to a multiple of 64 bytes
//! ```

use chrono::{TimeZone, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zerocopy::byteorder::little_endian::U64;
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Accepted image magics. The two revisions are handled identically.
pub const MAGIC_V0: &[u8; 8] = b"VIALFW00";
pub const MAGIC_V1: &[u8; 8] = b"VIALFW01";

/// Transfer chunk size; payloads are padded to a multiple of this.
pub const CHUNK_SIZE: usize = 64;

/// Hard cap on accepted images. Nothing legitimate comes close.
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

const HEADER_SIZE: usize = 64;

#[derive(Error, Debug)]
pub enum FirmwareError {
    #[error("Invalid firmware signature")]
    Signature,

    #[error("Firmware integrity check failed (expected sha256 {expected}, got {computed})")]
    Integrity { expected: String, computed: String },

    #[error("Firmware image truncated: {0} bytes is smaller than the header")]
    Truncated(usize),

    #[error("Firmware image too large: {0} bytes")]
    TooLarge(usize),
}

#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct ImageHeader {
    magic: [u8; 8],
    uid: [u8; 8],
    timestamp: U64,
    _reserved: [u8; 8],
    digest: [u8; 32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMagic {
    V0,
    V1,
}

/// A parsed and digest-verified firmware image.
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    magic: ImageMagic,
    uid: [u8; 8],
    timestamp: u64,
    payload: Vec<u8>,
}

impl FirmwareImage {
    /// Parse an image, rejecting it before any of it could reach a device:
    /// size cap, header presence, magic, then payload digest.
    pub fn parse(bytes: &[u8]) -> Result<Self, FirmwareError> {
        if bytes.len() > MAX_IMAGE_SIZE {
            return Err(FirmwareError::TooLarge(bytes.len()));
        }
        if bytes.len() < HEADER_SIZE {
            return Err(FirmwareError::Truncated(bytes.len()));
        }
        let (header, payload) = bytes.split_at(HEADER_SIZE);
        let header = ImageHeader::ref_from_bytes(header).map_err(|_| FirmwareError::Signature)?;

        let magic = if &header.magic == MAGIC_V0 {
            ImageMagic::V0
        } else if &header.magic == MAGIC_V1 {
            ImageMagic::V1
        } else {
            return Err(FirmwareError::Signature);
        };

        let computed: [u8; 32] = Sha256::digest(payload).into();
        if computed != header.digest {
            return Err(FirmwareError::Integrity {
                expected: hex::encode(header.digest),
                computed: hex::encode(computed),
            });
        }

        Ok(Self {
            magic,
            uid: header.uid,
            timestamp: header.timestamp.get(),
            payload: payload.to_vec(),
        })
    }

    pub fn magic(&self) -> ImageMagic {
        self.magic
    }

    /// UID of the device this image was built for.
    pub fn uid(&self) -> [u8; 8] {
        self.uid
    }

    /// Build timestamp, unix seconds.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Build time rendered for humans; raw seconds if out of range.
    pub fn build_time_utc(&self) -> String {
        match Utc.timestamp_opt(self.timestamp as i64, 0).single() {
            Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => format!("@{}", self.timestamp),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of transfer chunks (zero for an empty payload).
    pub fn chunk_count(&self) -> usize {
        self.payload.len().div_ceil(CHUNK_SIZE)
    }

    /// Payload as full chunks, the last one zero-padded.
    pub fn chunks(&self) -> impl Iterator<Item = [u8; CHUNK_SIZE]> + '_ {
        self.payload.chunks(CHUNK_SIZE).map(|part| {
            let mut chunk = [0u8; CHUNK_SIZE];
            chunk[..part.len()].copy_from_slice(part);
            chunk
        })
    }
}

/// Build a valid image for tests.
#[cfg(test)]
pub(crate) fn encode_image(magic: &[u8; 8], uid: [u8; 8], timestamp: u64, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(magic);
    out.extend_from_slice(&uid);
    out.extend_from_slice(&timestamp.to_le_bytes());
    out.extend_from_slice(&[0u8; 8]);
    let digest: [u8; 32] = Sha256::digest(payload).into();
    out.extend_from_slice(&digest);
    out.extend_from_slice(payload);
    out
}
