//! The managed region inside a hosts file.
//!
//! All writes are confined to a marker-delimited block; everything
//! outside the markers is preserved byte-for-byte. The block is
//! regenerated as a whole on every write, never patched line by line.

use std::net::IpAddr;

use crate::base::{Domain, Selection};

pub const START_MARKER: &str = "# === SmartHostsTool Start ===";
pub const END_MARKER: &str = "# === SmartHostsTool End ===";

/// Line span of the managed region, inclusive of both marker lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

/// Structural defects that make the region unsafe to rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionDefect {
    /// More than one start or end marker.
    Duplicate,
    /// One marker without its partner, or end before start.
    Damaged,
}

/// Finds the managed region in `lines`. `Ok(None)` when the file has no
/// region yet; a defect aborts the write so a damaged file is never
/// made worse.
pub fn locate(lines: &[&str]) -> Result<Option<Region>, RegionDefect> {
    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.trim() == START_MARKER)
        .map(|(i, _)| i)
        .collect();
    let ends: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.trim() == END_MARKER)
        .map(|(i, _)| i)
        .collect();

    match (starts.as_slice(), ends.as_slice()) {
        ([], []) => Ok(None),
        ([start], [end]) if start < end => Ok(Some(Region {
            start: *start,
            end: *end,
        })),
        ([_], [_]) => Err(RegionDefect::Damaged),
        ([], _) | (_, []) => Err(RegionDefect::Damaged),
        _ => Err(RegionDefect::Duplicate),
    }
}

/// Parses the `address domain` entries between the markers. Comment and
/// malformed lines inside the region are skipped; the region is rebuilt
/// wholesale on the next write anyway.
pub fn parse_entries(region_lines: &[&str]) -> Selection {
    let mut selection = Selection::new();
    for line in region_lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(addr) = parts.next().and_then(|t| t.parse::<IpAddr>().ok()) else {
            continue;
        };
        for token in parts {
            if token.starts_with('#') {
                break;
            }
            if let Ok(domain) = Domain::parse(token) {
                selection.insert(domain, addr);
            }
        }
    }
    selection
}

/// Renders the replacement block, markers included, one line per entry
/// in selection order.
pub fn build_block(selection: &Selection, updated_at: &str) -> Vec<String> {
    let mut block = Vec::with_capacity(selection.len() + 3);
    block.push(START_MARKER.to_string());
    block.push(format!("# Updated: {updated_at}"));
    for (domain, addr) in selection.iter() {
        block.push(format!("{addr} {domain}"));
    }
    block.push(END_MARKER.to_string());
    block
}

/// Splices `block` into `text`: in place of an existing region, or
/// appended at the end when none exists. Content outside the region is
/// carried over unchanged.
pub fn replace(text: &str, block: &[String]) -> Result<String, RegionDefect> {
    let lines: Vec<&str> = text.lines().collect();
    let region = locate(&lines)?;

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + block.len());
    match region {
        Some(Region { start, end }) => {
            out.extend(lines[..start].iter().map(|l| l.to_string()));
            out.extend(block.iter().cloned());
            out.extend(lines[end + 1..].iter().map(|l| l.to_string()));
        }
        None => {
            out.extend(lines.iter().map(|l| l.to_string()));
            // Blank separator between existing content and the block.
            if !out.is_empty() && !out.last().map(|l| l.is_empty()).unwrap_or(true) {
                out.push(String::new());
            }
            out.extend(block.iter().cloned());
        }
    }

    let mut joined = out.join("\n");
    joined.push('\n');
    Ok(joined)
}
