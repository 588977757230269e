//! Target registry and initialization
//!
//! This module resolves target specs into live [`TargetHandle`]s. It
//! completely hides the `Transport` trait and the concrete session types
//! from the public API.
//!
//! A spec is either a backend name with parameters
//! (`i2c:bus=/dev/i2c-2,addr=0x40,device=LCMXO2-2000`) or a platform
//! name looked up in the [`PlatformDb`]
//! (`clx-48c8d:region=1`). Unknown names are an error - never a
//! default, since defaulting to the wrong bus risks programming the
//! wrong chip.

use std::collections::HashMap;

use crate::handle::TargetHandle;
use crate::platform::{PlatformDb, PlatformDbError};

use cpldprog_core::device::{DeviceKind, DEVICES};
#[allow(unused_imports)] // Used in feature-gated code
use cpldprog_core::nor::{NorLayout, Slot};

/// Backend errors, raised before any device state is touched
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Spec names neither a backend nor a known platform
    #[error("unknown target '{0}' (not a backend, not a platform in the database)")]
    BackendNotFound(String),

    /// Backend exists but was not compiled in
    #[error("backend '{0}' is not enabled in this build (recompile with the matching feature)")]
    BackendDisabled(&'static str),

    /// Platform is known but has no such region
    #[error("platform '{platform}' has no region {region}")]
    RegionNotFound {
        /// Platform identifier as given
        platform: String,
        /// Requested region index
        region: u32,
    },

    /// A key=value parameter is malformed or unacceptable
    #[error("invalid parameter '{key}': {reason}")]
    InvalidParameter {
        /// The offending key
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// `device=` names no supported part
    #[error("unknown device type '{0}' (see list-devices)")]
    UnknownDevice(String),

    /// Platform database problem while resolving the spec
    #[error("platform database: {0}")]
    Db(#[from] PlatformDbError),

    /// Device refused or failed the registry's identity check
    #[error("device check failed: {0}")]
    Device(#[from] cpldprog_core::Error),

    /// I2C transport construction failed
    #[cfg(feature = "linux-i2c")]
    #[error(transparent)]
    I2c(#[from] cpldprog_linux_i2c::LinuxI2cError),

    /// SPI transport construction failed
    #[cfg(feature = "linux-spi")]
    #[error(transparent)]
    Spi(#[from] cpldprog_linux_spi::LinuxSpiError),
}

/// Parsed target parameters
#[derive(Debug)]
pub struct TargetParams {
    /// Backend or platform name
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl TargetParams {
    /// Parameters left over for the backend's own option parser
    #[cfg(any(feature = "linux-i2c", feature = "linux-spi"))]
    fn backend_options(&self) -> Vec<(&str, &str)> {
        // Keys the registry consumes itself
        const REGISTRY_KEYS: &[&str] = &[
            "device",
            "vendor",
            "slot",
            "update_base",
            "golden_base",
            "max_image",
        ];
        self.params
            .iter()
            .filter(|(k, _)| !REGISTRY_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse a target string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
///
/// # Example
/// ```ignore
/// let params = parse_target_params("i2c:bus=/dev/i2c-2,addr=0x40")?;
/// assert_eq!(params.name, "i2c");
/// assert_eq!(params.params.get("addr"), Some(&"0x40".to_string()));
/// ```
pub fn parse_target_params(s: &str) -> Result<TargetParams, BackendError> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.to_string(), value.to_string());
            } else {
                return Err(BackendError::InvalidParameter {
                    key: opt.to_string(),
                    reason: "expected key=value".to_string(),
                });
            }
        }
    }

    Ok(TargetParams {
        name: name.to_string(),
        params,
    })
}

// Parameter helpers

/// Parse a numeric parameter, accepting 0x-prefixed hex
fn parse_number(key: &str, value: &str) -> Result<u32, BackendError> {
    let parsed = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        value.parse()
    };
    parsed.map_err(|_| BackendError::InvalidParameter {
        key: key.to_string(),
        reason: format!("'{}' is not a number", value),
    })
}

/// Resolve a `device=` value to a supported part
///
/// Accepts the full part name ("LCMXO2-1200", with or without grade
/// suffix) and the short spelling used on the command line ("xo2-1200").
fn resolve_device(name: &str) -> Result<DeviceKind, BackendError> {
    let mut full = name.trim().to_uppercase();
    if full.starts_with("XO2") || full.starts_with("XO3") {
        full.insert_str(0, "LCM");
    }

    if let Some(kind) = DeviceKind::from_jedec_name(&full) {
        return Ok(kind);
    }

    // Grade-less spelling of a part whose table name carries one
    // ("xo3lf-2100" vs "LCMXO3LF-2100C"): accept a unique prefix.
    let mut matches = DEVICES.iter().filter(|d| d.name.starts_with(full.as_str()));
    match (matches.next(), matches.next()) {
        (Some(dev), None) => Ok(dev.kind),
        _ => Err(BackendError::UnknownDevice(name.to_string())),
    }
}

/// Resolve the `device=` parameter, which ECA backends require
fn required_device(params: &TargetParams) -> Result<DeviceKind, BackendError> {
    match params.params.get("device") {
        Some(name) => resolve_device(name),
        None => Err(BackendError::InvalidParameter {
            key: "device".to_string(),
            reason: "required for ECA targets (e.g. device=LCMXO2-1200)".to_string(),
        }),
    }
}

/// Resolve the NOR layout from `vendor=` plus optional base overrides
#[cfg(any(feature = "linux-spi", feature = "dummy"))]
fn nor_layout(params: &TargetParams) -> Result<(&'static str, NorLayout, Slot), BackendError> {
    let (name, mut layout): (&'static str, NorLayout) =
        match params.params.get("vendor").map(|v| v.as_str()) {
            Some("xilinx") => ("xilinx", NorLayout::XILINX),
            Some("anlogic") => ("anlogic", NorLayout::ANLOGIC),
            Some(other) => {
                return Err(BackendError::InvalidParameter {
                    key: "vendor".to_string(),
                    reason: format!("'{}' is not one of: xilinx, anlogic", other),
                })
            }
            None => {
                return Err(BackendError::InvalidParameter {
                    key: "vendor".to_string(),
                    reason: "required for NOR targets (vendor=xilinx or vendor=anlogic)"
                        .to_string(),
                })
            }
        };

    // Board-specific tables may relocate the slots
    if let Some(v) = params.params.get("update_base") {
        layout.update_base = parse_number("update_base", v)?;
    }
    if let Some(v) = params.params.get("golden_base") {
        layout.golden_base = parse_number("golden_base", v)?;
    }
    if let Some(v) = params.params.get("max_image") {
        layout.max_image = parse_number("max_image", v)?;
    }

    let slot = match params.params.get("slot").map(|v| v.as_str()) {
        None | Some("update") => Slot::Update,
        Some("golden") => Slot::Golden,
        Some(other) => {
            return Err(BackendError::InvalidParameter {
                key: "slot".to_string(),
                reason: format!("'{}' is not one of: update, golden", other),
            })
        }
    };

    Ok((name, layout, slot))
}

/// Backend names recognized by this registry, compiled in or not
///
/// Names here never fall through to a platform lookup, so a disabled
/// backend reports "not enabled" instead of "unknown platform".
const BACKEND_NAMES: &[&str] = &[
    "i2c",
    "i2c-eca",
    "spi",
    "spidev",
    "dummy-eca",
    "dummy-nor",
];

/// Open a target and create a TargetHandle
///
/// This is the main entry point for the CLI. It handles:
/// 1. Parsing the target string
/// 2. Resolving platform names through the database
/// 3. Opening the transport and binding the session
/// 4. Checking the device identity where the family supports it
///
/// # Arguments
/// * `spec` - Target specification (e.g. "i2c:bus=/dev/i2c-2,addr=0x40,device=LCMXO2-2000"
///   or "clx-48c8d:region=1")
/// * `db` - Platform database for name lookup
///
/// # Example
/// ```ignore
/// let db = PlatformDb::builtin()?;
/// let mut handle = open_target("demo", &db)?;
/// println!("bound to {}", handle.description());
/// ```
pub fn open_target(spec: &str, db: &PlatformDb) -> Result<TargetHandle, BackendError> {
    let params = parse_target_params(spec)?;

    if BACKEND_NAMES.contains(&params.name.as_str()) {
        return open_backend(&params);
    }

    // Not a backend name: treat it as a platform identifier
    let platform = db
        .find(&params.name)
        .ok_or_else(|| BackendError::BackendNotFound(params.name.clone()))?;

    let region = match params.params.get("region") {
        Some(v) => parse_number("region", v)?,
        None => 0,
    };
    let entry = platform
        .region(region)
        .ok_or_else(|| BackendError::RegionNotFound {
            platform: params.name.clone(),
            region,
        })?;

    log::info!(
        "{} region {}: {} -> {}",
        platform.name,
        entry.index,
        entry.label,
        entry.backend
    );

    // Spec parameters other than region= overlay the table entry, so
    // e.g. slot=golden can redirect a NOR region from the command line.
    let mut resolved = parse_target_params(&entry.backend)?;
    for (key, value) in &params.params {
        if key != "region" {
            resolved.params.insert(key.clone(), value.clone());
        }
    }

    if !BACKEND_NAMES.contains(&resolved.name.as_str()) {
        return Err(BackendError::Db(PlatformDbError::Validation(format!(
            "platform {} region {} names unknown backend '{}'",
            platform.name, entry.index, resolved.name
        ))));
    }

    let handle = open_backend(&resolved)?;
    Ok(handle.with_description(format!(
        "{} region {}: {}",
        platform.name, entry.index, entry.label
    )))
}

/// Open a backend by already-parsed parameters
fn open_backend(params: &TargetParams) -> Result<TargetHandle, BackendError> {
    match params.name.as_str() {
        #[cfg(feature = "linux-i2c")]
        "i2c" | "i2c-eca" => open_i2c(params),
        #[cfg(not(feature = "linux-i2c"))]
        "i2c" | "i2c-eca" => Err(BackendError::BackendDisabled("i2c")),

        #[cfg(feature = "linux-spi")]
        "spi" | "spidev" => open_spi(params),
        #[cfg(not(feature = "linux-spi"))]
        "spi" | "spidev" => Err(BackendError::BackendDisabled("spi")),

        #[cfg(feature = "dummy")]
        "dummy-eca" => open_dummy_eca(params),
        #[cfg(feature = "dummy")]
        "dummy-nor" => open_dummy_nor(params),
        #[cfg(not(feature = "dummy"))]
        "dummy-eca" | "dummy-nor" => Err(BackendError::BackendDisabled("dummy")),

        _ => Err(BackendError::BackendNotFound(params.name.clone())),
    }
}

// Backend-specific open functions
// Each opens the transport, binds a session and runs the identity check.

#[cfg(feature = "linux-i2c")]
fn open_i2c(params: &TargetParams) -> Result<TargetHandle, BackendError> {
    use cpldprog_core::session::EcaSession;
    use cpldprog_linux_i2c::{parse_options, LinuxI2c};

    let kind = required_device(params)?;
    let config = parse_options(&params.backend_options())?;

    log::info!("Opening I2C ECA target...");
    let bus = LinuxI2c::open(&config)?;

    let description = format!("i2c {} @0x{:02X} ({})", config.bus, config.address, kind);
    let mut session = EcaSession::new(bus, kind.info());
    session.check_device_id()?;

    Ok(TargetHandle::new(Box::new(session), description))
}

#[cfg(feature = "linux-spi")]
fn open_spi(params: &TargetParams) -> Result<TargetHandle, BackendError> {
    use cpldprog_core::nor::target::NorSession;
    use cpldprog_core::session::EcaSession;
    use cpldprog_linux_spi::{parse_options, LinuxSpi};

    let is_eca = params.params.contains_key("device");
    let is_nor = params.params.contains_key("vendor");
    if is_eca && is_nor {
        return Err(BackendError::InvalidParameter {
            key: "vendor".to_string(),
            reason: "give device= (ECA part) or vendor= (NOR flash), not both".to_string(),
        });
    }

    let config = parse_options(&params.backend_options())?;

    if is_eca {
        // Lattice part wired to SPI instead of I2C; same command set
        let kind = required_device(params)?;

        log::info!("Opening SPI ECA target...");
        let bus = LinuxSpi::open(&config)?;

        let description = format!("spi {} ({})", config.device, kind);
        let mut session = EcaSession::new(bus, kind.info());
        session.check_device_id()?;

        return Ok(TargetHandle::new(Box::new(session), description));
    }

    let (vendor, layout, slot) = nor_layout(params)?;

    log::info!("Opening SPI NOR target...");
    let mut bus = LinuxSpi::open(&config)?;

    match cpldprog_core::nor::read_id(&mut bus) {
        Ok(id) if id == [0x00; 3] || id == [0xFF; 3] => {
            log::warn!(
                "no flash answered on {} (JEDEC ID {:02X} {:02X} {:02X})",
                config.device,
                id[0],
                id[1],
                id[2]
            );
        }
        Ok(id) => {
            log::info!("flash JEDEC ID: {:02X} {:02X} {:02X}", id[0], id[1], id[2]);
        }
        Err(e) => return Err(BackendError::Device(e)),
    }

    let description = format!(
        "spi {} ({} {:?} slot @0x{:06X})",
        config.device,
        vendor,
        slot,
        layout.base(slot)
    );
    let session = NorSession::new(bus, vendor, layout, slot);

    Ok(TargetHandle::new(Box::new(session), description))
}

#[cfg(feature = "dummy")]
fn open_dummy_eca(params: &TargetParams) -> Result<TargetHandle, BackendError> {
    use cpldprog_core::session::EcaSession;
    use cpldprog_dummy::DummyEca;

    // The emulator defaults to a mid-range part; programming the wrong
    // chip is not a risk here.
    let kind = match params.params.get("device") {
        Some(name) => resolve_device(name)?,
        None => DeviceKind::MachXo2_1200,
    };

    log::info!("Opening emulated ECA target ({})...", kind);
    let emulator = DummyEca::new(kind);

    let description = format!("dummy-eca ({})", kind);
    let mut session = EcaSession::new(emulator, kind.info());
    session.check_device_id()?;

    Ok(TargetHandle::new(Box::new(session), description))
}

#[cfg(feature = "dummy")]
fn open_dummy_nor(params: &TargetParams) -> Result<TargetHandle, BackendError> {
    use cpldprog_core::nor::target::NorSession;
    use cpldprog_dummy::DummyNor;

    // vendor= defaults here for the same reason device= does above
    let mut params_with_default = TargetParams {
        name: params.name.clone(),
        params: params.params.clone(),
    };
    params_with_default
        .params
        .entry("vendor".to_string())
        .or_insert_with(|| "xilinx".to_string());

    let (vendor, layout, slot) = nor_layout(&params_with_default)?;

    log::info!("Opening emulated NOR target ({})...", vendor);
    let emulator = DummyNor::new_default();

    let description = format!("dummy-nor ({} {:?} slot)", vendor, slot);
    let session = NorSession::new(emulator, vendor, layout, slot);

    Ok(TargetHandle::new(Box::new(session), description))
}

// Backend information and listing

/// Information about a backend
pub struct BackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "linux-i2c")]
    backends.push(BackendInfo {
        name: "i2c",
        aliases: &["i2c-eca"],
        description: "Lattice ECA over /dev/i2c-* (bus=<path>,addr=<0xNN>,device=<part>)",
    });

    #[cfg(feature = "linux-spi")]
    backends.push(BackendInfo {
        name: "spi",
        aliases: &["spidev"],
        description:
            "ECA part or FPGA NOR flash over /dev/spidev* (dev=<path>,device=<part>|vendor=<xilinx|anlogic>[,slot=<update|golden>])",
    });

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy-eca",
        aliases: &[],
        description: "In-memory CPLD emulator for testing (device=<part>)",
    });

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy-nor",
        aliases: &[],
        description: "In-memory NOR flash emulator for testing (vendor=<xilinx|anlogic>)",
    });

    backends
}

/// Generate a short list of backend names for CLI help
pub fn backend_names_short() -> String {
    let backends = available_backends();
    if backends.is_empty() {
        return "none (recompile with features)".to_string();
    }
    let names: Vec<&str> = backends.iter().map(|b| b.name).collect();
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_name_only() {
        let params = parse_target_params("demo").unwrap();
        assert_eq!(params.name, "demo");
        assert!(params.params.is_empty());
    }

    #[test]
    fn parse_name_with_params() {
        let params = parse_target_params("i2c:bus=/dev/i2c-2,addr=0x40,device=LCMXO2-2000").unwrap();
        assert_eq!(params.name, "i2c");
        assert_eq!(params.params.get("bus").unwrap(), "/dev/i2c-2");
        assert_eq!(params.params.get("addr").unwrap(), "0x40");
        assert_eq!(params.params.get("device").unwrap(), "LCMXO2-2000");
    }

    #[test]
    fn parse_rejects_bare_key() {
        let err = parse_target_params("i2c:bus").unwrap_err();
        match err {
            BackendError::InvalidParameter { key, .. } => assert_eq!(key, "bus"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn numbers_decimal_and_hex() {
        assert_eq!(parse_number("addr", "64").unwrap(), 64);
        assert_eq!(parse_number("addr", "0x40").unwrap(), 0x40);
        assert!(parse_number("addr", "fourty").is_err());
    }

    #[test]
    fn device_name_spellings() {
        assert_eq!(
            resolve_device("LCMXO2-1200").unwrap(),
            DeviceKind::MachXo2_1200
        );
        assert_eq!(
            resolve_device("LCMXO2-1200HC-4SG32C").unwrap(),
            DeviceKind::MachXo2_1200
        );
        assert_eq!(resolve_device("xo2-640").unwrap(), DeviceKind::MachXo2_640);
        assert_eq!(
            resolve_device("xo3lf-2100").unwrap(),
            DeviceKind::MachXo3Lf2100
        );
        assert!(matches!(
            resolve_device("xo9-9999"),
            Err(BackendError::UnknownDevice(_))
        ));
    }

    #[test]
    fn unknown_platform_is_not_found() {
        let db = PlatformDb::new();
        let err = open_target("no-such-board", &db).unwrap_err();
        assert!(matches!(err, BackendError::BackendNotFound(_)));
    }

    #[test]
    fn unknown_region_is_not_found() {
        let db = PlatformDb::builtin().unwrap();
        let err = open_target("demo:region=7", &db).unwrap_err();
        match err {
            BackendError::RegionNotFound { platform, region } => {
                assert_eq!(platform, "demo");
                assert_eq!(region, 7);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn malformed_spec_never_opens() {
        let db = PlatformDb::builtin().unwrap();
        let err = open_target("demo:region", &db).unwrap_err();
        assert!(matches!(err, BackendError::InvalidParameter { .. }));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn dummy_eca_opens_and_reports() {
        let db = PlatformDb::new();
        let mut handle = open_target("dummy-eca:device=xo2-1200", &db).unwrap();
        let info = handle.info();
        assert_eq!(info.cfg_pages, 2175);
        assert_eq!(info.ufm_pages, 511);

        let probe = handle.probe().unwrap();
        assert_eq!(probe.idcode, 0x012B_A043);
        assert_eq!(probe.device.as_deref(), Some("LCMXO2-1200"));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn dummy_nor_slot_selects_base() {
        let db = PlatformDb::builtin().unwrap();

        let handle = open_target("dummy-nor:vendor=anlogic,slot=golden", &db).unwrap();
        assert!(handle.description().contains("anlogic"));
        assert!(handle.description().contains("Golden"));

        // Platform resolution with a slot overlay hits the same path
        let handle = open_target("demo:region=1,slot=golden", &db).unwrap();
        assert!(handle.description().contains("demo region 1"));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn spi_style_base_overrides_apply() {
        let db = PlatformDb::new();
        let handle = open_target(
            "dummy-nor:vendor=xilinx,update_base=0x10000,max_image=0x10000",
            &db,
        )
        .unwrap();
        let info = handle.info();
        assert_eq!(info.max_image, 0x10000);
    }
}
