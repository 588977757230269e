//! cpldprog - CPLD/FPGA in-system programmer
//!
//! Takes an image file, opens a target and runs the erase/program/verify
//! sequence against it, entirely in-system over I2C or SPI.
//!
//! # Architecture
//!
//! cpldprog drives two device families behind one `IspTarget` abstraction:
//! - **Lattice ECA parts** (MachXO2/XO3) - programmed page by page through
//!   the embedded configuration access port, over I2C or SPI, from a JEDEC
//!   fuse map
//! - **FPGA boot NOR flash** (Xilinx and Anlogic boards) - a bitstream slot
//!   in the plain SPI NOR chip the FPGA boots from, from a raw binary
//!
//! The same command implementations (program, verify, erase, read) work
//! regardless of the family; the target registry picks the session type
//! from the target spec string.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use cpldprog_target::raw::RawImage;
use cpldprog_target::{jedec, open_target, ImageData, PlatformDb, ProgramOptions, TargetInfo};

use std::path::Path;

fn main() {
    let cli = Cli::parse();

    // Initialize logger. Verbosity widens the default filter; an explicit
    // RUST_LOG still takes precedence.
    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Load platform database
    let db = load_platform_db(cli.db.as_deref())?;

    match cli.command {
        Commands::Program {
            target,
            input,
            ufm,
            feature_row,
            transparent,
            no_verify,
        } => {
            // Parse the image before opening any bus
            let source = load_image(&input)?;
            let mut handle = open_target(&target, &db)?;
            let image = bind_image(source, &handle.info())?;

            let mut options = ProgramOptions::CFG;
            if ufm {
                options |= ProgramOptions::UFM;
            }
            if feature_row {
                options |= ProgramOptions::FEATURE_ROW;
            }
            if transparent {
                options |= ProgramOptions::TRANSPARENT;
            }
            if !no_verify {
                options |= ProgramOptions::VERIFY;
            }

            commands::program::run(&mut handle, &image, options)
        }
        Commands::Verify {
            target,
            input,
            loops,
        } => {
            let source = load_image(&input)?;
            let mut handle = open_target(&target, &db)?;
            let image = bind_image(source, &handle.info())?;
            commands::verify::run(&mut handle, &image, loops)
        }
        Commands::Erase { target, check } => {
            let mut handle = open_target(&target, &db)?;
            commands::erase::run(&mut handle, check)
        }
        Commands::Read {
            target,
            output,
            sector,
            start_page,
            pages,
        } => {
            let mut handle = open_target(&target, &db)?;
            commands::read::run(&mut handle, &output, sector.into(), start_page, pages)
        }
        Commands::WriteRaw {
            target,
            input,
            sector,
            start_page,
        } => {
            let mut handle = open_target(&target, &db)?;
            commands::write_raw::run(&mut handle, &input, sector.into(), start_page)
        }
        Commands::Status { target } => {
            let mut handle = open_target(&target, &db)?;
            commands::status::run(&mut handle)
        }
        Commands::Probe { target } => {
            let mut handle = open_target(&target, &db)?;
            commands::probe::run(&mut handle)
        }
        Commands::ListTargets => {
            commands::list_targets(&db);
            Ok(())
        }
        Commands::ListDevices => {
            commands::list_devices();
            Ok(())
        }
    }
}

/// Load the platform database from the given file or fall back to the
/// builtin table
fn load_platform_db(path: Option<&Path>) -> Result<PlatformDb, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let mut db = PlatformDb::new();
            let count = db.load_file(path)?;
            log::info!("Loaded {} platforms from {}", count, path.display());
            Ok(db)
        }
        None => {
            let db = PlatformDb::builtin()?;
            log::debug!("Using builtin platform table ({} platforms)", db.len());
            Ok(db)
        }
    }
}

/// Image file contents, parsed as far as possible without a target
enum ImageSource {
    /// Parsed JEDEC fuse map
    Jedec(cpldprog_target::Image),
    /// Raw binary, checked against the target's size limit once it is open
    Raw(Vec<u8>),
}

/// Read and parse an image file
///
/// `.jed` files must parse as JEDEC fuse maps; any other extension is
/// taken as a raw binary for NOR targets. Parse errors surface here,
/// before any hardware is touched.
fn load_image(path: &Path) -> Result<ImageSource, Box<dyn std::error::Error>> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;

    let is_jedec = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("jed"))
        .unwrap_or(false);

    if is_jedec {
        let image = jedec::parse(&bytes)?;
        log::info!(
            "{}: {}, {} cfg pages, {} ufm pages",
            path.display(),
            image.device,
            image.cfg_page_count(),
            image.ufm_page_count()
        );
        Ok(ImageSource::Jedec(image))
    } else {
        log::info!("{}: raw image, {} bytes", path.display(), bytes.len());
        Ok(ImageSource::Raw(bytes))
    }
}

/// Bind a loaded image to an open target
fn bind_image(
    source: ImageSource,
    info: &TargetInfo,
) -> Result<ImageData, Box<dyn std::error::Error>> {
    match source {
        ImageSource::Jedec(image) => Ok(ImageData::Jedec(image)),
        ImageSource::Raw(bytes) => Ok(ImageData::Raw(RawImage::from_bytes(
            &bytes,
            info.max_image,
        )?)),
    }
}
