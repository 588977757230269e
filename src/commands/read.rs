//! Read command implementation

use std::fs::File;
use std::io::Write;
use std::path::Path;

use indicatif::ProgressBar;

use cpldprog_target::{Sector, TargetHandle};

use super::progress::bar_style;

/// Pages fetched per read_back call
const READ_CHUNK_PAGES: u32 = 256;

/// Run the read command
pub fn run(
    handle: &mut TargetHandle,
    output: &Path,
    sector: Sector,
    start_page: u32,
    pages: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let info = handle.info();
    let total = match sector {
        Sector::Cfg => info.cfg_pages,
        Sector::Ufm => info.ufm_pages,
    };

    if total == 0 {
        return Err(format!("{} has no {} sector", info.device, sector).into());
    }
    if start_page >= total {
        return Err(format!(
            "start page {} is beyond the {} sector ({} pages)",
            start_page, sector, total
        )
        .into());
    }

    let count = pages.unwrap_or(total - start_page);
    if count == 0 {
        return Err("nothing to read (0 pages)".into());
    }
    if start_page.checked_add(count).map_or(true, |end| end > total) {
        return Err(format!(
            "page range {}..{} exceeds the {} sector ({} pages)",
            start_page,
            start_page as u64 + count as u64,
            sector,
            total
        )
        .into());
    }

    println!(
        "Reading {} {} pages from {} ({})",
        count,
        sector,
        handle.description(),
        info.device
    );

    let pb = ProgressBar::new(count as u64);
    pb.set_style(bar_style());
    pb.set_message(format!("read {}", sector));

    let mut data = Vec::with_capacity(count as usize * info.page_size);
    let mut done = 0u32;
    while done < count {
        let chunk = READ_CHUNK_PAGES.min(count - done);
        let part = handle.read_back(sector, start_page + done, chunk)?;
        data.extend_from_slice(&part);
        done += chunk;
        pb.set_position(done as u64);
    }

    pb.finish_with_message("Read complete");

    let mut file = File::create(output)?;
    file.write_all(&data)?;

    println!("Wrote {} bytes to {:?}", data.len(), output);

    Ok(())
}
