//! Erase command implementation

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use cpldprog_target::{Sector, TargetFamily, TargetHandle};

use super::progress::bar_style;

/// Pages fetched per read_back call during the blank check
const CHECK_CHUNK_PAGES: u32 = 256;

/// Run the erase command
pub fn run(handle: &mut TargetHandle, check: bool) -> Result<(), Box<dyn std::error::Error>> {
    let info = handle.info();
    println!("Erasing {} ({})", handle.description(), info.device);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Erasing (this may take a while)...");
    pb.enable_steady_tick(Duration::from_millis(100));

    handle.clear()?;

    pb.finish_with_message("Erase complete");

    if check {
        blank_check(handle)?;
        println!("Blank check passed");
    }

    Ok(())
}

/// Read everything back and confirm it is in the erased state
///
/// ECA flash reads back zeroed after an erase; NOR flash reads 0xFF.
fn blank_check(handle: &mut TargetHandle) -> Result<(), Box<dyn std::error::Error>> {
    let info = handle.info();
    let blank = match info.family {
        TargetFamily::Eca => 0x00,
        TargetFamily::Nor => 0xFF,
    };

    check_sector(handle, Sector::Cfg, info.cfg_pages, info.page_size, blank)?;
    if info.ufm_pages > 0 {
        check_sector(handle, Sector::Ufm, info.ufm_pages, info.page_size, blank)?;
    }

    Ok(())
}

/// Scan one sector for bytes that survived the erase
fn check_sector(
    handle: &mut TargetHandle,
    sector: Sector,
    total_pages: u32,
    page_size: usize,
    blank: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    if total_pages == 0 {
        return Ok(());
    }

    let pb = ProgressBar::new(total_pages as u64);
    pb.set_style(bar_style());
    pb.set_message(format!("check {}", sector));

    let mut page = 0u32;
    while page < total_pages {
        let count = CHECK_CHUNK_PAGES.min(total_pages - page);
        let data = handle.read_back(sector, page, count)?;

        if let Some(pos) = data.iter().position(|&b| b != blank) {
            pb.abandon_with_message("Blank check failed!");
            return Err(format!(
                "Blank check failed: {} page {} offset {} reads 0x{:02X}, expected 0x{:02X}",
                sector,
                page + (pos / page_size) as u32,
                pos % page_size,
                data[pos],
                blank
            )
            .into());
        }

        page += count;
        pb.set_position(page as u64);
    }

    pb.finish();
    Ok(())
}
