//! Sparse memory image assembled from flat binary and Intel HEX sources.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Image encoding, chosen once from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Raw bytes at an implied offset.
    Binary,
    /// Self-describing addressed byte records (Intel HEX).
    Hex,
}

impl Format {
    /// Recognize a format from a path's extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") => Some(Format::Binary),
            Some("hex") => Some(Format::Hex),
            _ => None,
        }
    }
}

/// Address-indexed byte map built up from the pieces of a combined image.
///
/// Later writes overwrite earlier bytes at overlapping addresses. Addresses
/// never written stay absent: they become record gaps in Intel HEX output
/// and zero bytes in flat binary output.
#[derive(Debug, Default)]
pub struct MemoryImage {
    bytes: BTreeMap<u32, u8>,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a buffer at the given address.
    pub fn put(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        for (i, &byte) in data.iter().enumerate() {
            let addr = addr
                .checked_add(i as u32)
                .ok_or(Error::AddressOverflow)?;
            self.bytes.insert(addr, byte);
        }
        Ok(())
    }

    /// Load a flat binary file at the given address.
    pub fn load_bin(&mut self, path: &Path, addr: u32) -> Result<(), Error> {
        let data = fs::read(path).map_err(|e| Error::ReadFile(path.to_path_buf(), e))?;
        self.put(addr, &data)
    }

    /// Merge an Intel HEX file at the addresses encoded in its records.
    pub fn load_hex(&mut self, path: &Path) -> Result<(), Error> {
        let data =
            fs::read_to_string(path).map_err(|e| Error::ReadFile(path.to_path_buf(), e))?;

        let mut base = 0u32;
        for record in ihex::Reader::new(&data) {
            let record = record.map_err(|e| Error::ParseHex(path.to_path_buf(), e))?;
            match record {
                ihex::Record::Data { offset, value } => {
                    let addr = base
                        .checked_add(offset as u32)
                        .ok_or(Error::AddressOverflow)?;
                    self.put(addr, &value)?;
                }
                ihex::Record::ExtendedSegmentAddress(addr) => {
                    base = (addr as u32) << 4;
                }
                ihex::Record::ExtendedLinearAddress(addr) => {
                    base = (addr as u32) << 16;
                }
                ihex::Record::StartSegmentAddress { cs, ip } => {
                    base = ((cs as u32) << 4) + (ip as u32);
                }
                ihex::Record::StartLinearAddress(addr) => {
                    base = addr << 16;
                }
                ihex::Record::EndOfFile => {
                    // nothing to do
                }
            }
        }
        Ok(())
    }

    /// Serialize the image to a file in the given format.
    pub fn save(&self, path: &Path, format: Format) -> Result<(), Error> {
        let data = match format {
            Format::Binary => self.to_binary(),
            Format::Hex => self.to_hex()?.into_bytes(),
        };
        fs::write(path, data).map_err(|e| Error::WriteFile(path.to_path_buf(), e))
    }

    /// Flat binary spanning the lowest through highest written address.
    /// Unwritten gaps inside that range read as zero.
    fn to_binary(&self) -> Vec<u8> {
        let (first, last) = match (self.bytes.keys().next(), self.bytes.keys().next_back()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Vec::new(),
        };

        let mut out = vec![0u8; (last - first) as usize + 1];
        for (&addr, &byte) in &self.bytes {
            out[(addr - first) as usize] = byte;
        }
        out
    }

    /// Intel HEX with 32-byte data records, an extended linear address record
    /// whenever the upper 16 address bits change, and a final EOF record.
    fn to_hex(&self) -> Result<String, Error> {
        // Coalesce the byte map into runs of consecutive addresses.
        let mut runs: Vec<(u32, Vec<u8>)> = Vec::new();
        for (&addr, &byte) in &self.bytes {
            match runs.last_mut() {
                Some((start, data)) if start.checked_add(data.len() as u32) == Some(addr) => {
                    data.push(byte)
                }
                _ => runs.push((addr, vec![byte])),
            }
        }

        let mut records = Vec::new();
        let mut page = None;
        for (start, data) in &runs {
            let mut pos = 0;
            while pos < data.len() {
                let addr = start + pos as u32;
                let upper = addr >> 16;
                if page != Some(upper) {
                    records.push(ihex::Record::ExtendedLinearAddress(upper as u16));
                    page = Some(upper);
                }

                // Records must not cross a 64 KiB page, the offset field is
                // only 16 bits wide.
                let page_remaining = 0x1_0000 - (addr & 0xFFFF) as usize;
                let take = (data.len() - pos).min(32).min(page_remaining);
                records.push(ihex::Record::Data {
                    offset: (addr & 0xFFFF) as u16,
                    value: data[pos..pos + take].to_vec(),
                });
                pos += take;
            }
        }
        records.push(ihex::Record::EndOfFile);

        ihex::create_object_file_representation(&records).map_err(Error::SerializeHex)
    }
}

#[derive(Debug)]
pub enum Error {
    AddressOverflow,
    ParseHex(PathBuf, ihex::ReaderError),
    ReadFile(PathBuf, std::io::Error),
    SerializeHex(ihex::WriterError),
    WriteFile(PathBuf, std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AddressOverflow => write!(f, "address range exceeds 32 bits"),
            Error::ParseHex(path, e) => {
                write!(f, "failed to parse hex file \"{}\": {e}", path.display())
            }
            Error::ReadFile(path, e) => {
                write!(f, "failed to read \"{}\": {e}", path.display())
            }
            Error::SerializeHex(e) => write!(f, "failed to serialize hex output: {e}"),
            Error::WriteFile(path, e) => {
                write!(f, "failed to write \"{}\": {e}", path.display())
            }
        }
    }
}

impl std::error::Error for Error {}
