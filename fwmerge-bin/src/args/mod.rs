use {
    crate::image::Format,
    clap::Parser,
    std::path::PathBuf,
};

mod cli;
mod config;

pub use config::Error as ConfigError;

/// Program arguments loaded from the CLI and config file, fully resolved:
/// addresses parsed, formats decided.
#[derive(Debug, Clone)]
pub enum Args {
    /// Combine bootloader, header and application into one image.
    Combine {
        bootloader: PathBuf,
        bootloader_addr: u32,
        app: PathBuf,
        app_format: Format,
        app_addr: u32,
        header_addr: u32,
        output: PathBuf,
        output_format: Format,
        firmware_version: u64,
    },
    /// Dump the header fields of a file.
    Dump { input: PathBuf, offset: u32 },
}

pub fn args<I, T>(args: I) -> Result<Args, Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Args::try_parse_from(args).map_err(Error::Cli)?;
    match cli.command {
        cli::Command::Dump { input, offset } => Ok(Args::Dump {
            input,
            offset: parse_address(&offset)?,
        }),
        cli::Command::Combine {
            bootloader,
            bootloader_addr,
            app,
            app_addr,
            header_addr,
            output,
            firmware_version,
            config,
        } => {
            // Load and validate the config.
            let config = config.map(|c| config::Config::load(&c)).transpose()?;
            let config_bootloader = config.as_ref().and_then(|c| c.bootloader.clone());
            let config_bootloader_addr = config.as_ref().and_then(|c| c.bootloader_addr.clone());
            let config_app = config.as_ref().and_then(|c| c.app.clone());
            let config_app_addr = config.as_ref().and_then(|c| c.app_addr.clone());
            let config_header_addr = config.as_ref().and_then(|c| c.header_addr.clone());
            let config_output = config.as_ref().and_then(|c| c.output.clone());

            // Reconcile the CLI and config arguments. Error if anything is
            // specified both on the CLI and in the config file.
            let bootloader = match (bootloader, config_bootloader) {
                (None, None) => return Err(Error::BootloaderMissing),
                (None, Some(bootloader)) => bootloader,
                (Some(bootloader), None) => bootloader,
                (Some(_), Some(_)) => return Err(Error::BootloaderInConfigAndCli),
            };
            let bootloader_addr = match (bootloader_addr, config_bootloader_addr) {
                // Memory start unless told otherwise.
                (None, None) => 0,
                (None, Some(addr)) => parse_address(&addr)?,
                (Some(addr), None) => parse_address(&addr)?,
                (Some(_), Some(_)) => return Err(Error::BootloaderAddrInConfigAndCli),
            };
            let app = match (app, config_app) {
                (None, None) => return Err(Error::AppMissing),
                (None, Some(app)) => app,
                (Some(app), None) => app,
                (Some(_), Some(_)) => return Err(Error::AppInConfigAndCli),
            };
            let app_addr = match (app_addr, config_app_addr) {
                (None, None) => return Err(Error::AppAddrMissing),
                (None, Some(addr)) => parse_address(&addr)?,
                (Some(addr), None) => parse_address(&addr)?,
                (Some(_), Some(_)) => return Err(Error::AppAddrInConfigAndCli),
            };
            let header_addr = match (header_addr, config_header_addr) {
                (None, None) => return Err(Error::HeaderAddrMissing),
                (None, Some(addr)) => parse_address(&addr)?,
                (Some(addr), None) => parse_address(&addr)?,
                (Some(_), Some(_)) => return Err(Error::HeaderAddrInConfigAndCli),
            };
            let output = match (output, config_output) {
                (None, None) => return Err(Error::OutputMissing),
                (None, Some(output)) => output,
                (Some(output), None) => output,
                (Some(_), Some(_)) => return Err(Error::OutputInConfigAndCli),
            };

            // Decide the formats once, before any file is touched. The
            // bootloader has no defined semantics as addressed records, so
            // anything but a flat binary is refused here.
            match Format::from_extension(&bootloader) {
                Some(Format::Binary) => {}
                _ => return Err(Error::BootloaderFormat(bootloader)),
            }
            let app_format = Format::from_extension(&app).unwrap_or(Format::Hex);
            let output_format = Format::from_extension(&output)
                .ok_or_else(|| Error::OutputFormat(output.clone()))?;

            Ok(Args::Combine {
                bootloader,
                bootloader_addr,
                app,
                app_format,
                app_addr,
                header_addr,
                output,
                output_format,
                firmware_version,
            })
        }
    }
}

/// Parse an address literal, decimal or 0x-prefixed hexadecimal.
fn parse_address(literal: &str) -> Result<u32, Error> {
    let parsed = match literal.strip_prefix("0x").or_else(|| literal.strip_prefix("0X")) {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => literal.parse(),
    };
    parsed.map_err(|_| Error::InvalidAddress(literal.to_string()))
}

#[derive(Debug)]
pub enum Error {
    AppAddrInConfigAndCli,
    AppAddrMissing,
    AppInConfigAndCli,
    AppMissing,
    BootloaderAddrInConfigAndCli,
    BootloaderFormat(PathBuf),
    BootloaderInConfigAndCli,
    BootloaderMissing,
    Cli(clap::Error),
    Config(ConfigError),
    HeaderAddrInConfigAndCli,
    HeaderAddrMissing,
    InvalidAddress(String),
    OutputFormat(PathBuf),
    OutputInConfigAndCli,
    OutputMissing,
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AppAddrInConfigAndCli => {
                write!(f, "application address specified in both config and cli")
            }
            Error::AppAddrMissing => write!(f, "user did not specify an application address"),
            Error::AppInConfigAndCli => {
                write!(f, "application specified in both config and cli")
            }
            Error::AppMissing => write!(f, "user did not specify an application file"),
            Error::BootloaderAddrInConfigAndCli => {
                write!(f, "bootloader address specified in both config and cli")
            }
            Error::BootloaderFormat(path) => {
                write!(
                    f,
                    r#"bootloader must be a flat binary (.bin): "{}""#,
                    path.display()
                )
            }
            Error::BootloaderInConfigAndCli => {
                write!(f, "bootloader specified in both config and cli")
            }
            Error::BootloaderMissing => write!(f, "user did not specify a bootloader file"),
            Error::Cli(e) => write!(f, "{}", e.render().ansi()),
            Error::Config(e) => write!(f, "config error: {e}"),
            Error::HeaderAddrInConfigAndCli => {
                write!(f, "header address specified in both config and cli")
            }
            Error::HeaderAddrMissing => write!(f, "user did not specify a header address"),
            Error::InvalidAddress(literal) => {
                write!(
                    f,
                    r#"invalid address literal: "{literal}", expected decimal or 0x-prefixed hex"#
                )
            }
            Error::OutputFormat(path) => {
                write!(
                    f,
                    r#"unrecognized output extension (expected .bin or .hex): "{}""#,
                    path.display()
                )
            }
            Error::OutputInConfigAndCli => write!(f, "output specified in both config and cli"),
            Error::OutputMissing => write!(f, "user did not specify an output file"),
        }
    }
}

impl std::error::Error for Error {}
