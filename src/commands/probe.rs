//! Probe command implementation

use cpldprog_target::TargetHandle;

/// Read and print the identity registers of an open target
pub fn run(handle: &mut TargetHandle) -> Result<(), Box<dyn std::error::Error>> {
    println!("Probing {}", handle.description());

    let report = handle.probe()?;

    println!("Found device:");
    println!("  IDCODE: 0x{:08X}", report.idcode);
    match &report.device {
        Some(name) => println!("  Device: {}", name),
        None => println!("  Device: unknown (ID not in the device table)"),
    }
    if let Some(user_code) = report.user_code {
        println!("  USERCODE: 0x{:08X}", user_code);
    }
    if let Some(trace_id) = report.trace_id {
        let hex: Vec<String> = trace_id.iter().map(|b| format!("{:02X}", b)).collect();
        println!("  Trace ID: {}", hex.join(" "));
    }

    Ok(())
}
