//! Command line arguments.

use std::path::PathBuf;

#[derive(clap::Parser)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Combine a bootloader and an application into one flashable image,
    /// inserting a metadata header that describes the application.
    Combine {
        /// Path to the bootloader binary (flat .bin only).
        #[clap(short, long)]
        bootloader: Option<PathBuf>,
        /// Load address of the bootloader, decimal or 0x-prefixed hex.
        /// Defaults to the start of memory.
        #[clap(long)]
        bootloader_addr: Option<String>,
        /// Path to the application image (.bin, or addressed records such
        /// as .hex).
        #[clap(short, long)]
        app: Option<PathBuf>,
        /// Load address of the application, decimal or 0x-prefixed hex.
        /// Ignored when the application carries its own record addresses.
        #[clap(long)]
        app_addr: Option<String>,
        /// Address of the firmware metadata header, decimal or 0x-prefixed
        /// hex.
        #[clap(long)]
        header_addr: Option<String>,
        /// Path to write the combined image; the extension picks the output
        /// format (.bin or .hex).
        #[clap(short, long)]
        output: Option<PathBuf>,
        /// Version number recorded in the header.
        #[clap(long)]
        firmware_version: u64,
        /// Path to config file.
        #[clap(long, short)]
        config: Option<PathBuf>,
    },
    /// Dump the metadata header fields of a file.
    Dump {
        /// The file containing the header.
        #[clap(short, long)]
        input: PathBuf,
        /// Byte offset of the header within the file, decimal or 0x-prefixed
        /// hex.
        #[clap(long, default_value = "0")]
        offset: String,
    },
}
