#![no_std]


/// Firmware metadata header placed in front of the application slot.
///
/// All multi-byte integer fields are big-endian on the wire. The record is a
/// fixed [`Header::SIZE`] bytes for every input.
#[derive(Debug, Clone)]
pub struct Header {
    header_version: [u8; 4],
    firmware_version: [u8; 8],
    firmware_size: [u8; 8],
    firmware_hash: [u8; 64],
    header_checksum: [u8; 4],
}

/// SHA-256 hash function.
pub trait Sha256 {
    fn hash(&self, data: &[u8]) -> [u8; 32];
}

impl Header {
    /// Size of the header in bytes.
    pub const SIZE: usize = 88;

    /// Width of the hash slot in bytes.
    ///
    /// The slot is sized for a 512-bit digest. The SHA-256 digest occupies
    /// the low 32 bytes and the high 32 bytes are always zero; both halves
    /// are wire format and must survive serialization unchanged.
    pub const HASH_SLOT: usize = 64;

    /// Layout version written in the first word of the record.
    pub const VERSION: u32 = 1;

    /// Header layout version.
    pub fn header_version(&self) -> u32 {
        u32::from_be_bytes(self.header_version)
    }

    /// Firmware version supplied by the caller. Monotonic by convention,
    /// not enforced.
    pub fn firmware_version(&self) -> u64 {
        u64::from_be_bytes(self.firmware_version)
    }

    /// Byte length of the application payload the header describes.
    pub fn firmware_size(&self) -> u64 {
        u64::from_be_bytes(self.firmware_size)
    }

    /// SHA-256 digest of the application payload in the low 32 bytes,
    /// zero-padded to the full slot width.
    pub fn firmware_hash(&self) -> &[u8; 64] {
        &self.firmware_hash
    }

    /// CRC-32 over every serialized byte preceding the checksum field.
    pub fn header_checksum(&self) -> u32 {
        u32::from_be_bytes(self.header_checksum)
    }

    /// Build a header describing the given application payload.
    ///
    /// Deterministic: identical payload and version always produce an
    /// identical record. Any payload length is accepted, including zero.
    pub fn build(firmware: &[u8], firmware_version: u64, sha: &impl Sha256) -> Self {
        let mut header = Self {
            header_version: Self::VERSION.to_be_bytes(),
            firmware_version: firmware_version.to_be_bytes(),
            firmware_size: (firmware.len() as u64).to_be_bytes(),
            firmware_hash: [0; Self::HASH_SLOT],
            header_checksum: [0; 4],
        };
        header.firmware_hash[..32].copy_from_slice(&sha.hash(firmware));

        let mut candidate = [0u8; Self::SIZE];
        header
            .serialize(&mut candidate)
            .expect("candidate buffer is header sized");
        header.header_checksum = checksum(&candidate[..Self::SIZE - 4]).to_be_bytes();
        header
    }

    /// Serialize the header to a buffer. Exactly [`Self::SIZE`] bytes will be
    /// written.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<(), Error> {
        if buf.len() < Self::SIZE {
            return Err(Error::SerializeBufferTooSmall);
        }

        buf[..4].copy_from_slice(&self.header_version);
        buf[4..12].copy_from_slice(&self.firmware_version);
        buf[12..20].copy_from_slice(&self.firmware_size);
        buf[20..84].copy_from_slice(&self.firmware_hash);
        buf[84..Self::SIZE].copy_from_slice(&self.header_checksum);

        Ok(())
    }

    /// Parse a header from the front of a buffer and check its checksum.
    ///
    /// Returns `None` if the buffer does not start with a recognized header
    /// layout version, i.e. the data is not a header at all.
    pub fn parse(data: &[u8]) -> Result<Option<Self>, Error> {
        if data.len() < 4 {
            return Ok(None);
        }

        let header_version: [u8; 4] = data[..4].try_into().unwrap();
        if u32::from_be_bytes(header_version) != Self::VERSION {
            // Layout version is missing or not recognized, so this is not a
            // header.
            return Ok(None);
        }

        // The data carries a header tag, so make sure it's of appropriate
        // length.
        if data.len() < Self::SIZE {
            return Err(Error::HeaderTooShort);
        }

        let header = Self {
            header_version,
            firmware_version: data[4..12].try_into().unwrap(),
            firmware_size: data[12..20].try_into().unwrap(),
            firmware_hash: data[20..84].try_into().unwrap(),
            header_checksum: data[84..Self::SIZE].try_into().unwrap(),
        };

        let computed = checksum(&data[..Self::SIZE - 4]);
        let stored = header.header_checksum();
        if stored != computed {
            return Err(Error::InvalidChecksum { stored, computed });
        }

        Ok(Some(header))
    }

    /// Check the recorded size and hash against an actual application
    /// payload.
    pub fn verify_firmware(&self, firmware: &[u8], sha: &impl Sha256) -> Result<(), Error> {
        let actual = firmware.len() as u64;
        if self.firmware_size() != actual {
            return Err(Error::InvalidFirmwareSize {
                header: self.firmware_size(),
                actual,
            });
        }

        let mut expected = [0u8; Self::HASH_SLOT];
        expected[..32].copy_from_slice(&sha.hash(firmware));
        if self.firmware_hash != expected {
            return Err(Error::InvalidFirmwareHash);
        }

        Ok(())
    }
}

/// CRC-32, ISO-3309/zlib polynomial.
pub(crate) fn checksum(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[derive(Debug)]
pub enum Error {
    HeaderTooShort,
    InvalidChecksum { stored: u32, computed: u32 },
    InvalidFirmwareHash,
    InvalidFirmwareSize { header: u64, actual: u64 },
    SerializeBufferTooSmall,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::HeaderTooShort => write!(f, "header too short"),
            Self::InvalidChecksum { stored, computed } => write!(
                f,
                "invalid header checksum: stored {stored:#010x}, computed {computed:#010x}",
            ),
            Self::InvalidFirmwareHash => write!(f, "firmware hash does not match header"),
            Self::InvalidFirmwareSize { header, actual } => write!(
                f,
                "invalid firmware size in header: should be {actual}, but is {header}",
            ),
            Self::SerializeBufferTooSmall => write!(f, "buffer too small for serialization"),
        }
    }
}
