//! JEDEC fuse-map parser
//!
//! Parses the ASCII fuse-map format the Lattice tools emit: an STX byte,
//! a series of '*'-terminated fields dispatched on their leading
//! character, and an ETX byte. Fuse rows are 128 ASCII bits packed
//! MSB-first into 16-byte pages.
//!
//! Parsing runs in two passes. The first resolves the device type from
//! the "DEVICE NAME" note, because the split between configuration and
//! UFM pages depends on the device's page table. The second accumulates
//! rows and fields against that table. A device note that appears after
//! fuse rows have already been read is rejected: accepting it would
//! silently misattribute the rows already parsed.

use alloc::vec::Vec;

use log::{debug, warn};

use crate::device::{DeviceKind, FeatureRow, Sector, ECA_PAGE_SIZE};
use crate::error::{Error, Result};
use crate::image::Image;

const STX: u8 = 0x02;
const ETX: u8 = 0x03;

/// Fallback part when the file carries no device note
const DEFAULT_DEVICE: DeviceKind = DeviceKind::MachXo2_1200;

/// Parse a JEDEC fuse file into an [`Image`]
pub fn parse(input: &[u8]) -> Result<Image> {
    if input.first() != Some(&STX) {
        return Err(Error::MalformedHeader);
    }
    let device = resolve_device(input)?;
    parse_fields(input, device)
}

/// First pass: find the device note, rejecting one placed after fuse data
fn resolve_device(input: &[u8]) -> Result<DeviceKind> {
    let mut rows_seen = false;
    for raw in input.split(|&b| b == b'\n') {
        let line = clean(raw);
        if line.is_empty() {
            continue;
        }
        match line[0] {
            ETX => break,
            b'0' | b'1' => rows_seen = true,
            b'N' => {
                if let Some(name) = note_device_name(line) {
                    if rows_seen {
                        return Err(Error::MalformedHeader);
                    }
                    match DeviceKind::from_jedec_name(name) {
                        Some(kind) => return Ok(kind),
                        None => warn!("ignoring unknown device name {:?}", name),
                    }
                }
            }
            _ => {}
        }
    }
    warn!(
        "fuse file names no device, assuming {}",
        DEFAULT_DEVICE.info().name
    );
    Ok(DEFAULT_DEVICE)
}

/// Second pass: accumulate fields against the resolved device
fn parse_fields(input: &[u8], device: DeviceKind) -> Result<Image> {
    let info = device.info();
    let cfg_cap = info.sector_bytes(Sector::Cfg);
    let ufm_cap = info.sector_bytes(Sector::Ufm);

    let mut cfg_data = Vec::new();
    let mut ufm_data = Vec::new();
    let mut feature_row = FeatureRow::default();
    let mut user_code = 0u32;
    let mut security_fuses = 0u32;
    let mut page_count = 0u32;
    let mut fuse_count: Option<u32> = None;

    let mut lines = input.split(|&b| b == b'\n');
    while let Some(raw) = lines.next() {
        let mut line = clean(raw);
        if line.first() == Some(&STX) {
            line = clean(&line[1..]);
        }
        if line.is_empty() {
            continue;
        }
        match line[0] {
            ETX => break,
            b'0' | b'1' => {
                let mut page = [0u8; ECA_PAGE_SIZE];
                if !pack_bits(line, &mut page) {
                    return Err(Error::MalformedHeader);
                }
                if cfg_data.len() < cfg_cap {
                    cfg_data.extend_from_slice(&page);
                } else if ufm_data.len() < ufm_cap {
                    ufm_data.extend_from_slice(&page);
                } else {
                    return Err(Error::ImageTooLarge {
                        size: (page_count as usize + 1) * ECA_PAGE_SIZE,
                        max: cfg_cap + ufm_cap,
                    });
                }
                page_count += 1;
            }
            b'E' => {
                if !pack_bits(&line[1..], &mut feature_row.feature) {
                    return Err(Error::MalformedFeatureRow);
                }
                let next = lines.next().ok_or(Error::MalformedFeatureRow)?;
                if !pack_bits(clean(next), &mut feature_row.feabits) {
                    return Err(Error::MalformedFeatureRow);
                }
            }
            b'U' => user_code = parse_user_code(&line[1..])?,
            b'G' => {
                security_fuses = match line.get(1) {
                    Some(b'0') => 0,
                    Some(b'1') => 1,
                    _ => return Err(Error::MalformedHeader),
                };
            }
            b'Q' => {
                if line.get(1) == Some(&b'F') {
                    fuse_count = parse_decimal(&line[2..]);
                }
            }
            // Notes were handled in the first pass; L (fuse address),
            // C (checksum), D and F (defaults) carry nothing we program
            b'N' | b'L' | b'C' | b'D' | b'F' => {}
            other => debug!("ignoring JEDEC field 0x{:02X}", other),
        }
    }

    if let Some(qf) = fuse_count {
        let rows = qf / (ECA_PAGE_SIZE as u32 * 8);
        if rows != page_count {
            warn!(
                "QF declares {} fuse rows but file carries {}",
                rows, page_count
            );
        }
    }

    debug!(
        "parsed fuse file for {}: {} cfg pages, {} ufm pages",
        info.name,
        cfg_data.len() / ECA_PAGE_SIZE,
        ufm_data.len() / ECA_PAGE_SIZE
    );

    Ok(Image {
        device,
        cfg_data,
        ufm_data,
        feature_row,
        user_code,
        security_fuses,
        page_count,
    })
}

/// Trim whitespace and cut the line at its '*' field terminator
fn clean(mut line: &[u8]) -> &[u8] {
    if let Some(star) = line.iter().position(|&b| b == b'*') {
        line = &line[..star];
    }
    while let Some((&first, rest)) = line.split_first() {
        if first.is_ascii_whitespace() {
            line = rest;
        } else {
            break;
        }
    }
    while let Some((&last, rest)) = line.split_last() {
        if last.is_ascii_whitespace() {
            line = rest;
        } else {
            break;
        }
    }
    line
}

/// Extract the name from a "NOTE DEVICE NAME: <part>" line
fn note_device_name(line: &[u8]) -> Option<&str> {
    let text = core::str::from_utf8(line).ok()?;
    let (_, name) = text.split_once("DEVICE NAME:")?;
    Some(name.trim())
}

/// Pack ASCII '0'/'1' characters MSB-first into `out`
///
/// Returns false unless `bits` is exactly `out.len() * 8` binary digits.
fn pack_bits(bits: &[u8], out: &mut [u8]) -> bool {
    if bits.len() != out.len() * 8 {
        return false;
    }
    for byte in out.iter_mut() {
        *byte = 0;
    }
    for (i, &c) in bits.iter().enumerate() {
        match c {
            b'0' => {}
            b'1' => out[i / 8] |= 0x80 >> (i % 8),
            _ => return false,
        }
    }
    true
}

/// Parse the U field: `H` hex, `A` ASCII, or 32 binary digits
fn parse_user_code(rest: &[u8]) -> Result<u32> {
    match rest.first() {
        Some(b'H') | Some(b'h') => parse_hex32(&rest[1..]).ok_or(Error::MalformedHeader),
        Some(b'A') => {
            let ascii = rest.get(1..5).ok_or(Error::MalformedHeader)?;
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(ascii);
            Ok(u32::from_be_bytes(bytes))
        }
        _ => {
            let mut bytes = [0u8; 4];
            if !pack_bits(rest, &mut bytes) {
                return Err(Error::MalformedHeader);
            }
            Ok(u32::from_be_bytes(bytes))
        }
    }
}

fn parse_hex32(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() || digits.len() > 8 {
        return None;
    }
    let mut value = 0u32;
    for &d in digits {
        let nibble = match d {
            b'0'..=b'9' => d - b'0',
            b'a'..=b'f' => d - b'a' + 10,
            b'A'..=b'F' => d - b'A' + 10,
            _ => return None,
        };
        value = (value << 4) | nibble as u32;
    }
    Some(value)
}

fn parse_decimal(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() {
        return None;
    }
    let mut value = 0u32;
    for &d in digits {
        if !d.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add((d - b'0') as u32)?;
    }
    Some(value)
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::String;

    fn row(first: u8) -> String {
        let mut s = String::new();
        s.push(first as char);
        while s.len() < 128 {
            s.push('0');
        }
        s
    }

    fn minimal_file() -> String {
        let mut f = String::from("\x02\n");
        f.push_str("NOTE DEVICE NAME: LCMXO2-1200HC-4SG32C*\n");
        f.push_str("QF343936*\n");
        f.push_str("L00000*\n");
        f.push_str(&format!("{}*\n", row(b'1')));
        f.push_str(&format!("{}*\n", row(b'0')));
        f.push_str("UH0012ABCD*\n");
        f.push_str(&format!("E{}*\n", "10000000".repeat(8)));
        f.push_str("1000000000000001*\n");
        f.push_str("G0*\n");
        f.push('\x03');
        f
    }

    #[test]
    fn parses_minimal_file() {
        let image = parse(minimal_file().as_bytes()).unwrap();
        assert_eq!(image.device, DeviceKind::MachXo2_1200);
        assert_eq!(image.cfg_page_count(), 2);
        assert_eq!(image.ufm_page_count(), 0);
        assert_eq!(image.page_count, 2);
        assert_eq!(image.cfg_data[0], 0x80);
        assert_eq!(image.cfg_data[1], 0x00);
        assert_eq!(image.user_code, 0x0012_ABCD);
        assert_eq!(image.feature_row.feature, [0x80; 8]);
        assert_eq!(image.feature_row.feabits, [0x80, 0x01]);
        assert_eq!(image.security_fuses, 0);
    }

    #[test]
    fn rejects_missing_stx() {
        let mut f = minimal_file().into_bytes();
        f[0] = 0x01;
        assert_eq!(parse(&f), Err(Error::MalformedHeader));
    }

    #[test]
    fn rejects_device_note_after_fuse_rows() {
        let mut f = String::from("\x02\n");
        f.push_str(&format!("{}*\n", row(b'0')));
        f.push_str("NOTE DEVICE NAME: LCMXO2-640HC*\n");
        f.push('\x03');
        assert_eq!(parse(f.as_bytes()), Err(Error::MalformedHeader));
    }

    #[test]
    fn defaults_to_xo2_1200_without_device_note() {
        let mut f = String::from("\x02\n");
        f.push_str(&format!("{}*\n", row(b'1')));
        f.push('\x03');
        let image = parse(f.as_bytes()).unwrap();
        assert_eq!(image.device, DeviceKind::MachXo2_1200);
    }

    #[test]
    fn truncated_feature_row_is_rejected() {
        let mut f = String::from("\x02\n");
        f.push_str(&format!("E{}*", "00000000".repeat(8)));
        // No FEABITS continuation line at all
        assert_eq!(parse(f.as_bytes()), Err(Error::MalformedFeatureRow));

        f.push('\n');
        f.push_str("10*\n");
        f.push('\x03');
        // Continuation present but not 16 bits
        assert_eq!(parse(f.as_bytes()), Err(Error::MalformedFeatureRow));
    }

    #[test]
    fn wrong_length_fuse_row_is_rejected() {
        let f = "\x02\n0101*\n\x03";
        assert_eq!(parse(f.as_bytes()), Err(Error::MalformedHeader));
    }

    #[test]
    fn rows_past_cfg_spill_into_ufm() {
        let info = DeviceKind::MachXo2_640.info();
        let mut f = String::from("\x02\n");
        f.push_str("NOTE DEVICE NAME: LCMXO2-640HC*\n");
        for _ in 0..info.cfg_pages {
            f.push_str(&format!("{}*\n", row(b'0')));
        }
        f.push_str(&format!("{}*\n", row(b'1')));
        f.push('\x03');
        let image = parse(f.as_bytes()).unwrap();
        assert_eq!(image.cfg_page_count(), info.cfg_pages);
        assert_eq!(image.ufm_page_count(), 1);
        assert_eq!(image.ufm_data[0], 0x80);
    }

    #[test]
    fn too_many_rows_overflow_the_part() {
        let info = DeviceKind::MachXo2_256.info();
        let mut f = String::from("\x02\n");
        f.push_str("NOTE DEVICE NAME: LCMXO2-256HC*\n");
        for _ in 0..info.cfg_pages + 1 {
            f.push_str(&format!("{}*\n", row(b'0')));
        }
        f.push('\x03');
        assert!(matches!(
            parse(f.as_bytes()),
            Err(Error::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn binary_user_code_field() {
        let mut f = String::from("\x02\n");
        f.push_str(&format!("U{}{}*\n", "1".repeat(8), "0".repeat(24)));
        f.push('\x03');
        let image = parse(f.as_bytes()).unwrap();
        assert_eq!(image.user_code, 0xFF00_0000);
    }
}
