//! List commands implementation

use cpldprog_target::{available_backends, PlatformDb, DEVICES};

/// List available backends and the platforms in the database
pub fn list_targets(db: &PlatformDb) {
    println!("Available backends:");
    println!();
    for backend in available_backends() {
        let name = if backend.aliases.is_empty() {
            backend.name.to_string()
        } else {
            format!("{} ({})", backend.name, backend.aliases.join(", "))
        };
        println!("  {:<18} {}", name, backend.description);
    }

    println!();
    if db.is_empty() {
        println!("No platforms in the database.");
        return;
    }

    println!("Known platforms:");
    println!();
    for platform in db.iter() {
        println!("  {}", platform.name);
        for region in &platform.regions {
            println!(
                "    region {}: {:<24} {}",
                region.index, region.label, region.backend
            );
        }
    }
}

/// List all supported devices
pub fn list_devices() {
    println!("Supported devices:");
    println!();
    println!(
        "{:<16} {:>10} {:>10} {:>10} {:>12}",
        "Device", "IDCODE", "Cfg pages", "UFM pages", "Erase (ms)"
    );
    println!("{}", "-".repeat(64));

    for dev in DEVICES {
        println!(
            "{:<16} 0x{:08X} {:>10} {:>10} {:>12}",
            dev.name, dev.idcode, dev.cfg_pages, dev.ufm_pages, dev.cfg_erase_ms
        );
    }
}
