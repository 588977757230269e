//! Platform database for runtime loading and lookup
//!
//! Boards that carry programmable logic are described by a RON table
//! mapping a platform identifier to its regions ("system CPLD",
//! "fan CPLD", "FPGA update flash", ...). Each region names a backend
//! spec string in the same `name:key=value,...` format accepted on the
//! command line, so resolving a platform region and opening a
//! hand-written backend spec share one code path.
//!
//! A default table is compiled into the binary
//! ([`PlatformDb::builtin`]); deployments with their own boards load a
//! RON file over it at runtime.

use std::fs;
use std::io;
use std::path::Path;

/// Error type for platform database operations
#[derive(Debug, thiserror::Error)]
pub enum PlatformDbError {
    /// I/O error reading files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// RON parsing error
    #[error("parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// Validation error
    #[error("validation error: {0}")]
    Validation(String),
}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

/// Single region definition in RON format
#[derive(Debug, Clone, serde::Deserialize)]
struct RegionDef {
    index: u32,
    #[serde(default)]
    label: String,
    backend: String,
}

/// Platform definition containing its regions
#[derive(Debug, Clone, serde::Deserialize)]
struct PlatformDef {
    name: String,
    regions: Vec<RegionDef>,
}

/// Top-level RON document
#[derive(Debug, Clone, serde::Deserialize)]
struct PlatformFileDef {
    platforms: Vec<PlatformDef>,
}

// ============================================================================
// Platform database
// ============================================================================

/// One programmable region of a platform
#[derive(Debug, Clone)]
pub struct RegionEntry {
    /// Region index, unique within the platform
    pub index: u32,
    /// Human-readable role of the device ("system CPLD", ...)
    pub label: String,
    /// Backend spec string, `name:key=value,...`
    pub backend: String,
}

/// One known platform and its programmable regions
#[derive(Debug, Clone)]
pub struct Platform {
    /// Platform identifier matched against the target spec
    pub name: String,
    /// Regions in table order
    pub regions: Vec<RegionEntry>,
}

impl Platform {
    /// Find a region by index
    pub fn region(&self, index: u32) -> Option<&RegionEntry> {
        self.regions.iter().find(|r| r.index == index)
    }
}

/// Runtime platform database
///
/// Holds platform descriptions loaded from RON. Looked up by the
/// registry when a target spec names a platform instead of a backend.
#[derive(Debug, Clone, Default)]
pub struct PlatformDb {
    platforms: Vec<Platform>,
}

/// RON table compiled into the binary
const BUILTIN: &str = include_str!("../platforms.ron");

impl PlatformDb {
    /// Create an empty platform database
    pub fn new() -> Self {
        Self {
            platforms: Vec::new(),
        }
    }

    /// Load the table compiled into the binary
    pub fn builtin() -> Result<Self, PlatformDbError> {
        let mut db = Self::new();
        db.load_ron(BUILTIN)?;
        Ok(db)
    }

    /// Load platform definitions from a RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, PlatformDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load platform definitions from a RON string
    ///
    /// A platform that is already present is replaced, so a user table
    /// can override individual builtin entries.
    pub fn load_ron(&mut self, content: &str) -> Result<usize, PlatformDbError> {
        let def: PlatformFileDef = ron::from_str(content)?;
        let count = def.platforms.len();

        for platform_def in def.platforms {
            let mut seen = Vec::new();
            for region in &platform_def.regions {
                if seen.contains(&region.index) {
                    return Err(PlatformDbError::Validation(format!(
                        "platform {} defines region {} twice",
                        platform_def.name, region.index
                    )));
                }
                seen.push(region.index);
            }

            let platform = Platform {
                name: platform_def.name,
                regions: platform_def
                    .regions
                    .into_iter()
                    .map(|r| RegionEntry {
                        index: r.index,
                        label: r.label,
                        backend: r.backend,
                    })
                    .collect(),
            };

            self.platforms.retain(|p| p.name != platform.name);
            self.platforms.push(platform);
        }

        Ok(count)
    }

    /// Get all platforms in the database
    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    /// Get the number of platforms in the database
    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// Find a platform by name (exact match)
    pub fn find(&self, name: &str) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.name == name)
    }

    /// Iterate over all platforms
    pub fn iter(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_ron() {
        let ron = r#"
        (
            platforms: [
                (
                    name: "testboard",
                    regions: [
                        (index: 0, label: "system CPLD", backend: "i2c:bus=/dev/i2c-9,addr=0x40,device=LCMXO2-640"),
                        (index: 1, backend: "spi:dev=/dev/spidev9.0,vendor=anlogic"),
                    ],
                ),
            ],
        )
        "#;

        let mut db = PlatformDb::new();
        let count = db.load_ron(ron).unwrap();

        assert_eq!(count, 1);
        assert_eq!(db.len(), 1);

        let platform = db.find("testboard").unwrap();
        assert_eq!(platform.regions.len(), 2);

        let region = platform.region(0).unwrap();
        assert_eq!(region.label, "system CPLD");
        assert!(region.backend.starts_with("i2c:"));

        let region = platform.region(1).unwrap();
        assert_eq!(region.label, "");
        assert!(region.backend.starts_with("spi:"));

        assert!(platform.region(2).is_none());
        assert!(db.find("otherboard").is_none());
    }

    #[test]
    fn test_builtin_parses() {
        let db = PlatformDb::builtin().unwrap();
        assert!(!db.is_empty());

        // The emulator platform ships in the builtin table
        let demo = db.find("demo").unwrap();
        assert!(demo.region(0).unwrap().backend.starts_with("dummy-eca:"));
        assert!(demo.region(1).unwrap().backend.starts_with("dummy-nor:"));
    }

    #[test]
    fn test_override_replaces_platform() {
        let mut db = PlatformDb::builtin().unwrap();
        let before = db.len();

        db.load_ron(
            r#"(platforms: [(name: "demo", regions: [
                (index: 0, label: "only region", backend: "dummy-eca:device=LCMXO2-256"),
            ])])"#,
        )
        .unwrap();

        assert_eq!(db.len(), before);
        let demo = db.find("demo").unwrap();
        assert_eq!(demo.regions.len(), 1);
        assert!(demo.region(0).unwrap().backend.contains("LCMXO2-256"));
    }

    #[test]
    fn test_duplicate_region_rejected() {
        let mut db = PlatformDb::new();
        let err = db
            .load_ron(
                r#"(platforms: [(name: "bad", regions: [
                    (index: 0, backend: "dummy-eca:"),
                    (index: 0, backend: "dummy-nor:"),
                ])])"#,
            )
            .unwrap_err();
        assert!(matches!(err, PlatformDbError::Validation(_)));
    }
}
