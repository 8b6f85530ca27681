use {
    colored::Colorize,
    sha2::Digest,
    std::{
        ffi::OsString,
        io::{Read, Write},
    },
    tracing_subscriber::{fmt, prelude::*, EnvFilter},
};

mod args;
mod image;


use image::{Format, MemoryImage};

fn main() -> std::process::ExitCode {
    // Progress narration defaults to info level, RUST_LOG overrides it.
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    main_args(
        std::env::args_os(),
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .into()
}

fn main_args<I, T>(args: I, stdout: impl Write, mut stderr: impl Write) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match run(args, stdout) {
        Ok(()) => ExitCode(0),
        Err(Error::Args(e @ args::Error::Cli(_))) => {
            // Clap already does the "error: {}" formatting.
            writeln!(stderr, "{e}").expect("write error to stderr");
            ExitCode(1)
        }
        Err(e) => {
            writeln!(stderr, "{} {e}", "error:".bold().red()).expect("write error to stderr");
            ExitCode(1)
        }
    }
}

fn run<I, T>(args: I, mut stdout: impl Write) -> Result<(), Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match args::args(args)? {
        args::Args::Combine {
            bootloader,
            bootloader_addr,
            app,
            app_format,
            app_addr,
            header_addr,
            output,
            output_format,
            firmware_version,
        } => {
            let mut image = MemoryImage::new();

            tracing::info!(
                "loading bootloader {} at {:#010x}",
                bootloader.display(),
                bootloader_addr
            );
            image.load_bin(&bootloader, bootloader_addr)?;

            // The header describes the application file bytes as given, for
            // either source format.
            let app_bytes = std::fs::read(&app).map_err(Error::ReadAppFile)?;
            let header = fwmerge::Header::build(&app_bytes, firmware_version, &Sha256);
            tracing::info!("firmware size: {}", header.firmware_size());
            tracing::info!(
                "firmware hash: {}",
                hex::encode(&header.firmware_hash()[..32])
            );
            tracing::info!("firmware version: {}", header.firmware_version());

            let mut header_buf = [0u8; fwmerge::Header::SIZE];
            header.serialize(&mut header_buf)?;
            tracing::info!("writing header at {:#010x}", header_addr);
            image.put(header_addr, &header_buf)?;

            match app_format {
                Format::Binary => {
                    tracing::info!(
                        "loading application {} at {:#010x}",
                        app.display(),
                        app_addr
                    );
                    image.put(app_addr, &app_bytes)?;
                }
                Format::Hex => {
                    // Addressed records place themselves, the application
                    // address does not apply.
                    tracing::info!(
                        "merging application {} at its record addresses",
                        app.display()
                    );
                    image.load_hex(&app)?;
                }
            }

            image.save(&output, output_format)?;
            writeln!(stdout, "combined image written to {}", output.display())
                .map_err(Error::Stdout)?;
        }
        args::Args::Dump { input, offset } => {
            let mut input_buf = Vec::new();
            std::fs::File::open(&input)
                .map_err(Error::OpenInputFile)?
                .read_to_end(&mut input_buf)
                .map_err(Error::ReadInputFile)?;
            let data = input_buf
                .get(offset as usize..)
                .ok_or(Error::OffsetPastEnd {
                    offset,
                    len: input_buf.len(),
                })?;
            match fwmerge::Header::parse(data)? {
                Some(header) => {
                    writeln!(
                        &mut stdout,
                        "{:16} {}",
                        "header version".bold(),
                        header.header_version(),
                    )
                    .map_err(Error::Stdout)?;
                    writeln!(
                        &mut stdout,
                        "{:16} {}",
                        "version".bold(),
                        header.firmware_version(),
                    )
                    .map_err(Error::Stdout)?;
                    let human_size =
                        humansize::format_size(header.firmware_size(), humansize::BINARY);
                    writeln!(
                        &mut stdout,
                        "{:16} {human_size} ({})",
                        "size".bold(),
                        header.firmware_size(),
                    )
                    .map_err(Error::Stdout)?;
                    let hash = header.firmware_hash();
                    writeln!(&mut stdout, "{:16} {}", "hash".bold(), hex::encode(&hash[..32]))
                        .map_err(Error::Stdout)?;
                    writeln!(
                        &mut stdout,
                        "{} {}",
                        " ".repeat(16),
                        hex::encode(&hash[32..]),
                    )
                    .map_err(Error::Stdout)?;
                    writeln!(
                        &mut stdout,
                        "{:16} {:#010x}",
                        "checksum".bold(),
                        header.header_checksum(),
                    )
                    .map_err(Error::Stdout)?;
                }
                None => {
                    writeln!(&mut stdout, "{}", "no header found".bold()).map_err(Error::Stdout)?
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Sha256;

impl fwmerge::Sha256 for Sha256 {
    fn hash(&self, data: &[u8]) -> [u8; 32] {
        sha2::Sha256::digest(data).into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExitCode(u8);

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        code.0.into()
    }
}

#[derive(Debug)]
enum Error {
    Args(args::Error),
    Header(fwmerge::Error),
    Image(image::Error),
    OffsetPastEnd { offset: u32, len: usize },
    OpenInputFile(std::io::Error),
    ReadAppFile(std::io::Error),
    ReadInputFile(std::io::Error),
    Stdout(std::io::Error),
}

impl From<args::Error> for Error {
    fn from(e: args::Error) -> Self {
        Error::Args(e)
    }
}

impl From<fwmerge::Error> for Error {
    fn from(e: fwmerge::Error) -> Self {
        Error::Header(e)
    }
}

impl From<image::Error> for Error {
    fn from(e: image::Error) -> Self {
        Error::Image(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Args(e) => write!(f, "{e}"),
            Error::Header(e) => write!(f, "{e}"),
            Error::Image(e) => write!(f, "{e}"),
            Error::OffsetPastEnd { offset, len } => {
                write!(f, "offset {offset:#x} is past the end of the file ({len} bytes)")
            }
            Error::OpenInputFile(e) => write!(f, "failed to open input file: {e}"),
            Error::ReadAppFile(e) => write!(f, "failed to read application file: {e}"),
            Error::ReadInputFile(e) => write!(f, "failed to read input file: {e}"),
            Error::Stdout(e) => write!(f, "failed to write to stdout: {e}"),
        }
    }
}

impl std::error::Error for Error {}
