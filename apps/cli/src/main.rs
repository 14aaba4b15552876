use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use md380_dfu::{DfuSession, NusbConnector, SessionConfig, hexdump};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "MD380 DFU bootloader tool", long_about = None)]
struct Args {
    /// Session configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the DFU status record
    Status,
    /// Print the DFU state
    State,
    /// Clear an error status
    ClearStatus,
    /// Abort the current operation
    Abort,
    /// Leave DFU mode and start the application
    Detach,
    /// Reboot the radio
    Reboot,
    /// Halt the radio and show "Programming Mode"
    ProgramMode,
    /// Dump the 32-byte command response from block 0
    Command,
    /// Set the target address for block transfers
    SetAddress {
        #[arg(value_parser = parse_u32)]
        address: u32,
    },
    /// Erase the flash block containing an address
    Erase {
        #[arg(value_parser = parse_u32)]
        address: u32,
    },
    /// Read one block from the device
    Upload {
        #[arg(long, value_parser = parse_u16)]
        block: u16,
        #[arg(long, value_parser = parse_u16, default_value = "1024")]
        length: u16,
        /// Write the block to a file instead of dumping it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a file's contents to one block
    Download {
        #[arg(long, value_parser = parse_u16)]
        block: u16,
        input: PathBuf,
    },
    /// Write the effective configuration as TOML
    Config {
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", s, e))
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let value = parse_u32(s)?;
    u16::try_from(value).map_err(|_| format!("'{}' does not fit in 16 bits", s))
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SessionConfig::default(),
    };

    if let Command::Config { output } = &args.command {
        config.save_to_file(output)?;
        info!(path = %output.display(), "Configuration written");
        return Ok(());
    }

    let mut session = DfuSession::new(NusbConnector, config);
    if !session.connect() {
        bail!(
            "no DFU device {:04x}:{:04x} found (is the radio in bootloader mode?)",
            session.config().vendor_id,
            session.config().product_id
        );
    }

    match args.command {
        Command::Status => println!("{}", session.get_status()?),
        Command::State => println!("{}", session.get_state()?),
        Command::ClearStatus => session.clear_status()?,
        Command::Abort => session.abort()?,
        Command::Detach => session.detach()?,
        Command::Reboot => println!("{}", session.reboot()?),
        Command::ProgramMode => println!("{}", session.program_mode()?),
        Command::Command => print!("{}", hexdump(&session.get_command()?)),
        Command::SetAddress { address } => println!("{}", session.set_address(address)?),
        Command::Erase { address } => println!("{}", session.erase_block(address)?),
        Command::Upload {
            block,
            length,
            output,
        } => {
            let data = session.upload(block, length)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &data)?;
                    info!(path = %path.display(), bytes = data.len(), "Block saved");
                }
                None => print!("{}", hexdump(&data)),
            }
        }
        Command::Download { block, input } => {
            let data = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
            println!("{}", session.download(block, &data)?);
        }
        Command::Config { .. } => unreachable!("handled before connecting"),
    }

    if session.holds_transport() {
        session.disconnect()?;
    }
    Ok(())
}
