//! Write-raw command implementation
//!
//! Writes file contents straight into flash pages with no erase and no
//! verify pass. Meant for recovery and bring-up work; the program
//! command is the safe path for full images.

use std::path::Path;

use cpldprog_target::{Sector, TargetHandle};

/// Run the write-raw command
pub fn run(
    handle: &mut TargetHandle,
    input: &Path,
    sector: Sector,
    start_page: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let data =
        std::fs::read(input).map_err(|e| format!("cannot read {}: {}", input.display(), e))?;
    if data.is_empty() {
        return Err("input file is empty".into());
    }

    let info = handle.info();
    println!(
        "Writing {} bytes to {} {} at page {}",
        data.len(),
        info.device,
        sector,
        start_page
    );

    handle.write_raw(sector, start_page, &data)?;

    println!("Write complete ({} bytes)", data.len());

    Ok(())
}
