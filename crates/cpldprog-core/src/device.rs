//! Device model for ECA-programmed parts
//!
//! Flash geometry and timing for the MachXO2/XO3LF families. All parts share
//! the 16-byte flash page; they differ in page counts, erase budgets and the
//! refresh time needed after handing control back to user logic.

use core::fmt;

/// Flash page size of the embedded configuration engine, in bytes
pub const ECA_PAGE_SIZE: usize = 16;

/// Flash sectors addressable through the configuration interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Sector {
    /// Configuration flash (the device's main bitstream storage)
    Cfg,
    /// User flash memory
    Ufm,
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cfg => write!(f, "Cfg"),
            Self::Ufm => write!(f, "UFM"),
        }
    }
}

/// Feature row contents: 8 feature bytes plus the 2 FEABITS bytes
///
/// Stored exactly as programmed, most significant byte first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureRow {
    /// The 64-bit feature field
    pub feature: [u8; 8],
    /// The 16-bit FEABITS field
    pub feabits: [u8; 2],
}

impl FeatureRow {
    /// Check whether every bit is clear (the erased state)
    pub fn is_blank(&self) -> bool {
        self.feature.iter().all(|&b| b == 0) && self.feabits.iter().all(|&b| b == 0)
    }
}

/// Supported parts, by family and density
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// MachXO2-256
    MachXo2_256,
    /// MachXO2-640
    MachXo2_640,
    /// MachXO2-1200
    MachXo2_1200,
    /// MachXO2-2000
    MachXo2_2000,
    /// MachXO2-4000
    MachXo2_4000,
    /// MachXO2-7000
    MachXo2_7000,
    /// MachXO3LF-2100C
    MachXo3Lf2100,
    /// MachXO3LF-4300C
    MachXo3Lf4300,
}

/// Static description of one part: identity, geometry and timing
#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    /// Which part this entry describes
    pub kind: DeviceKind,
    /// Device name as it appears in fuse file DEVICE NAME lines
    pub name: &'static str,
    /// JTAG/ECA IDCODE
    pub idcode: u32,
    /// Number of 16-byte configuration flash pages
    pub cfg_pages: u32,
    /// Number of 16-byte UFM pages (0 when the part has no UFM)
    pub ufm_pages: u32,
    /// Worst-case configuration flash erase time, in milliseconds
    pub cfg_erase_ms: u32,
    /// Worst-case UFM erase time, in milliseconds
    pub ufm_erase_ms: u32,
    /// Worst-case feature row / SRAM erase time, in milliseconds
    pub feature_erase_ms: u32,
    /// Time for the device to reconfigure after REFRESH, in milliseconds
    pub refresh_ms: u32,
}

/// All supported parts
pub const DEVICES: &[DeviceInfo] = &[
    DeviceInfo {
        kind: DeviceKind::MachXo2_256,
        name: "LCMXO2-256",
        idcode: 0x012B_8043,
        cfg_pages: 575,
        ufm_pages: 0,
        cfg_erase_ms: 700,
        ufm_erase_ms: 500,
        feature_erase_ms: 50,
        refresh_ms: 1,
    },
    DeviceInfo {
        kind: DeviceKind::MachXo2_640,
        name: "LCMXO2-640",
        idcode: 0x012B_9043,
        cfg_pages: 1151,
        ufm_pages: 191,
        cfg_erase_ms: 1100,
        ufm_erase_ms: 600,
        feature_erase_ms: 50,
        refresh_ms: 1,
    },
    DeviceInfo {
        kind: DeviceKind::MachXo2_1200,
        name: "LCMXO2-1200",
        idcode: 0x012B_A043,
        cfg_pages: 2175,
        ufm_pages: 511,
        cfg_erase_ms: 1400,
        ufm_erase_ms: 900,
        feature_erase_ms: 50,
        refresh_ms: 2,
    },
    DeviceInfo {
        kind: DeviceKind::MachXo2_2000,
        name: "LCMXO2-2000",
        idcode: 0x012B_B043,
        cfg_pages: 3198,
        ufm_pages: 639,
        cfg_erase_ms: 1900,
        ufm_erase_ms: 1000,
        feature_erase_ms: 50,
        refresh_ms: 3,
    },
    DeviceInfo {
        kind: DeviceKind::MachXo2_4000,
        name: "LCMXO2-4000",
        idcode: 0x012B_C043,
        cfg_pages: 5758,
        ufm_pages: 767,
        cfg_erase_ms: 3100,
        ufm_erase_ms: 1300,
        feature_erase_ms: 50,
        refresh_ms: 4,
    },
    DeviceInfo {
        kind: DeviceKind::MachXo2_7000,
        name: "LCMXO2-7000",
        idcode: 0x012B_D043,
        cfg_pages: 9212,
        ufm_pages: 2046,
        cfg_erase_ms: 4800,
        ufm_erase_ms: 1600,
        feature_erase_ms: 50,
        refresh_ms: 5,
    },
    DeviceInfo {
        kind: DeviceKind::MachXo3Lf2100,
        name: "LCMXO3LF-2100C",
        idcode: 0x612B_B043,
        cfg_pages: 3198,
        ufm_pages: 639,
        cfg_erase_ms: 1900,
        ufm_erase_ms: 1000,
        feature_erase_ms: 50,
        refresh_ms: 3,
    },
    DeviceInfo {
        kind: DeviceKind::MachXo3Lf4300,
        name: "LCMXO3LF-4300C",
        idcode: 0x612B_C043,
        cfg_pages: 5758,
        ufm_pages: 767,
        cfg_erase_ms: 3100,
        ufm_erase_ms: 1300,
        feature_erase_ms: 50,
        refresh_ms: 4,
    },
];

impl DeviceKind {
    /// Get the static description for this part
    pub fn info(self) -> &'static DeviceInfo {
        let idx = match self {
            Self::MachXo2_256 => 0,
            Self::MachXo2_640 => 1,
            Self::MachXo2_1200 => 2,
            Self::MachXo2_2000 => 3,
            Self::MachXo2_4000 => 4,
            Self::MachXo2_7000 => 5,
            Self::MachXo3Lf2100 => 6,
            Self::MachXo3Lf4300 => 7,
        };
        &DEVICES[idx]
    }

    /// Look up a part by its IDCODE
    pub fn from_idcode(idcode: u32) -> Option<Self> {
        DEVICES.iter().find(|d| d.idcode == idcode).map(|d| d.kind)
    }

    /// Look up a part from a fuse file device name line
    ///
    /// Matches the leading density designator, so speed/package suffixes
    /// ("LCMXO2-1200HC-4SG32C") still resolve.
    pub fn from_jedec_name(name: &str) -> Option<Self> {
        let name = name.trim();
        // Longest names first so "LCMXO2-2000" is not shadowed by a prefix
        let mut best: Option<(&'static DeviceInfo, usize)> = None;
        for dev in DEVICES {
            if name.starts_with(dev.name) {
                let len = dev.name.len();
                if best.map(|(_, l)| len > l).unwrap_or(true) {
                    best = Some((dev, len));
                }
            }
        }
        best.map(|(d, _)| d.kind)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info().name)
    }
}

impl DeviceInfo {
    /// Number of pages in the given sector
    pub fn page_count(&self, sector: Sector) -> u32 {
        match sector {
            Sector::Cfg => self.cfg_pages,
            Sector::Ufm => self.ufm_pages,
        }
    }

    /// Total sector size in bytes
    pub fn sector_bytes(&self, sector: Sector) -> usize {
        self.page_count(sector) as usize * ECA_PAGE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_index_matches_table() {
        for dev in DEVICES {
            assert_eq!(dev.kind.info().kind, dev.kind);
        }
    }

    #[test]
    fn idcode_lookup_roundtrips() {
        for dev in DEVICES {
            assert_eq!(DeviceKind::from_idcode(dev.idcode), Some(dev.kind));
        }
        assert_eq!(DeviceKind::from_idcode(0xDEAD_BEEF), None);
    }

    #[test]
    fn name_lookup_handles_suffixes() {
        assert_eq!(
            DeviceKind::from_jedec_name("LCMXO2-1200HC-4SG32C"),
            Some(DeviceKind::MachXo2_1200)
        );
        assert_eq!(
            DeviceKind::from_jedec_name("LCMXO2-256HC"),
            Some(DeviceKind::MachXo2_256)
        );
        assert_eq!(
            DeviceKind::from_jedec_name("LCMXO3LF-4300C-6BG256C"),
            Some(DeviceKind::MachXo3Lf4300)
        );
        assert_eq!(DeviceKind::from_jedec_name("iCE40UP5K"), None);
    }

    #[test]
    fn smallest_part_has_no_ufm() {
        let info = DeviceKind::MachXo2_256.info();
        assert_eq!(info.page_count(Sector::Ufm), 0);
        assert_eq!(info.sector_bytes(Sector::Ufm), 0);
    }
}
