use std::path::{Path, PathBuf};

/// Stable memory-layout parameters of a board, so they don't have to be
/// repeated on every invocation. The firmware version is deliberately not
/// configurable here: it is a per-release decision and must be given on the
/// command line.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub bootloader: Option<PathBuf>,
    pub bootloader_addr: Option<String>,
    pub app: Option<PathBuf>,
    pub app_addr: Option<String>,
    pub header_addr: Option<String>,
    pub output: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let config = std::fs::read_to_string(path)?;
        toml::from_str(&config).map_err(Into::into)
    }
}

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Toml(toml::de::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Toml(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "failed to read config file: {e}"),
            Error::Toml(e) => write!(f, "config file format error in TOML: {e}"),
        }
    }
}

impl std::error::Error for Error {}
