//! Status command implementation

use cpldprog_target::TargetHandle;

/// Run the status command
pub fn run(handle: &mut TargetHandle) -> Result<(), Box<dyn std::error::Error>> {
    let info = handle.info();
    println!("Target: {} ({})", handle.description(), info.device);

    let status = handle.status()?;
    println!("Status register: 0x{:08X}", status.raw);
    println!("  busy: {}", if status.busy { "yes" } else { "no" });
    println!("  done: {}", if status.done { "yes" } else { "no" });
    println!("  fail: {}", if status.fail { "yes" } else { "no" });
    println!("  {}", status.detail);

    Ok(())
}
