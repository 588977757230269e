//! Verify command implementation

use cpldprog_target::{ImageData, TargetHandle};

use super::progress::BarProgress;

/// Run the verify command
///
/// `loops` > 1 repeats the full compare, which shakes out marginal bus
/// wiring that passes a single read.
pub fn run(
    handle: &mut TargetHandle,
    image: &ImageData,
    loops: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let info = handle.info();
    println!("Verifying {} ({})", handle.description(), info.device);

    let passes = loops.max(1);
    for pass in 1..=passes {
        if passes > 1 {
            println!("Verify pass {}/{}", pass, passes);
        }
        let mut progress = BarProgress::new();
        handle.verify(image, &mut progress)?;
    }

    println!("Verification passed!");

    Ok(())
}
