//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use cpldprog_target::Sector;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Generate dynamic help text for the target argument
fn target_help() -> String {
    format!(
        "Target to operate on, as name:key=value,... [backends: {}]",
        cpldprog_target::backend_names_short()
    )
}

#[derive(Parser)]
#[command(name = "cpldprog")]
#[command(author, version, about = "CPLD/FPGA in-system programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Platform database file (RON), replacing the builtin table
    #[arg(long, global = true, value_name = "FILE")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flash sector addressed by the read and write-raw commands
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum SectorArg {
    /// Configuration flash
    Cfg,
    /// User flash memory
    Ufm,
}

impl From<SectorArg> for Sector {
    fn from(arg: SectorArg) -> Self {
        match arg {
            SectorArg::Cfg => Sector::Cfg,
            SectorArg::Ufm => Sector::Ufm,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Erase, program and verify a device from an image file
    Program {
        /// Target to operate on
        #[arg(short, long, help = target_help())]
        target: String,

        /// Input file (.jed fuse map; anything else is a raw binary)
        #[arg(short, long)]
        input: PathBuf,

        /// Also program the user flash memory from the image
        #[arg(long)]
        ufm: bool,

        /// Also program the feature row and feature bits from the image
        #[arg(long)]
        feature_row: bool,

        /// Update while the current configuration keeps running
        #[arg(long)]
        transparent: bool,

        /// Skip the verify pass after programming
        #[arg(long)]
        no_verify: bool,
    },

    /// Verify device contents against an image file
    Verify {
        /// Target to operate on
        #[arg(short, long, help = target_help())]
        target: String,

        /// Input file to verify against (.jed or raw binary)
        #[arg(short, long)]
        input: PathBuf,

        /// Number of verify passes, for exercising marginal links
        #[arg(long, value_parser = parse_hex_u32, default_value = "1")]
        loops: u32,
    },

    /// Erase the device
    Erase {
        /// Target to operate on
        #[arg(short, long, help = target_help())]
        target: String,

        /// Read everything back afterwards and check it is blank
        #[arg(long)]
        check: bool,
    },

    /// Read device contents to a file
    Read {
        /// Target to operate on
        #[arg(short, long, help = target_help())]
        target: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Sector to read
        #[arg(long, value_enum, default_value_t = SectorArg::Cfg)]
        sector: SectorArg,

        /// First page to read (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start_page: u32,

        /// Number of pages to read (default: rest of the sector)
        #[arg(long, value_parser = parse_hex_u32)]
        pages: Option<u32>,
    },

    /// Write a file into flash pages, skipping the erase/program sequence
    WriteRaw {
        /// Target to operate on
        #[arg(short, long, help = target_help())]
        target: String,

        /// Input file with page data
        #[arg(short, long)]
        input: PathBuf,

        /// Sector to write
        #[arg(long, value_enum, default_value_t = SectorArg::Cfg)]
        sector: SectorArg,

        /// First page to write (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start_page: u32,
    },

    /// Show the device status register
    Status {
        /// Target to operate on
        #[arg(short, long, help = target_help())]
        target: String,
    },

    /// Identify the device behind a target
    Probe {
        /// Target to operate on
        #[arg(short, long, help = target_help())]
        target: String,
    },

    /// List available backends and known platforms
    ListTargets,

    /// List supported devices
    ListDevices,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_and_decimal_values() {
        assert_eq!(parse_hex_u32("0"), Ok(0));
        assert_eq!(parse_hex_u32("512"), Ok(512));
        assert_eq!(parse_hex_u32("0x200"), Ok(0x200));
        assert_eq!(parse_hex_u32("0X7f"), Ok(0x7F));
        assert!(parse_hex_u32("12a").is_err());
    }

    #[test]
    fn program_flags_parse() {
        let cli = Cli::try_parse_from([
            "cpldprog",
            "program",
            "-t",
            "dummy-eca",
            "-i",
            "image.jed",
            "--ufm",
            "--no-verify",
        ])
        .unwrap();
        match cli.command {
            Commands::Program {
                target,
                input,
                ufm,
                feature_row,
                transparent,
                no_verify,
            } => {
                assert_eq!(target, "dummy-eca");
                assert_eq!(input, PathBuf::from("image.jed"));
                assert!(ufm);
                assert!(!feature_row);
                assert!(!transparent);
                assert!(no_verify);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn read_accepts_hex_pages() {
        let cli = Cli::try_parse_from([
            "cpldprog",
            "read",
            "-t",
            "dummy-eca",
            "-o",
            "dump.bin",
            "--sector",
            "ufm",
            "--start-page",
            "0x10",
            "--pages",
            "32",
        ])
        .unwrap();
        match cli.command {
            Commands::Read {
                sector,
                start_page,
                pages,
                ..
            } => {
                assert!(matches!(sector, SectorArg::Ufm));
                assert_eq!(start_page, 0x10);
                assert_eq!(pages, Some(32));
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn status_requires_target() {
        assert!(Cli::try_parse_from(["cpldprog", "status"]).is_err());
    }

    #[test]
    fn verify_loops_default_to_one() {
        let cli = Cli::try_parse_from(["cpldprog", "verify", "-t", "dummy-eca", "-i", "a.jed"])
            .unwrap();
        match cli.command {
            Commands::Verify { loops, .. } => assert_eq!(loops, 1),
            _ => panic!("wrong command"),
        }
    }
}
