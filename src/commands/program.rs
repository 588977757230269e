//! The program command: erase, write and verify in one sequence

use cpldprog_target::{ImageData, ProgramOptions, TargetHandle};

use super::progress::BarProgress;

/// Run the full programming sequence against an open target
pub fn run(
    handle: &mut TargetHandle,
    image: &ImageData,
    options: ProgramOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let info = handle.info();
    println!("Programming {} ({})", handle.description(), info.device);

    // A fuse map can carry UFM data the caller did not ask to program
    if let ImageData::Jedec(jed) = image {
        if jed.ufm_page_count() > 0 && !options.contains(ProgramOptions::UFM) {
            log::warn!(
                "image carries {} UFM pages; pass --ufm to program them",
                jed.ufm_page_count()
            );
        }
    }

    let mut progress = BarProgress::new();
    handle.program(image, options, &mut progress)?;

    if options.contains(ProgramOptions::VERIFY) {
        println!("Programming complete (verified)");
    } else {
        println!("Programming complete (not verified)");
    }

    Ok(())
}
