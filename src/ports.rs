use anyhow::{bail, Context, Result};
use std::collections::HashSet;

/// Lowest probeable TCP port.
pub const MIN_PORT: u16 = 1;
/// Highest probeable TCP port.
pub const MAX_PORT: u16 = 65535;

/// Every TCP port, 1..=65535, ascending.
pub fn all_ports() -> Vec<u16> {
    (MIN_PORT..=MAX_PORT).collect()
}

/// Parse a port spec into a deduplicated list of TCP ports (1..=65535).
///
/// Supported tokens, separated by commas, whitespace or newlines:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
/// - comments: everything after `#` on a line is ignored
///
/// First appearance wins when a port is listed more than once.
pub fn parse_port_spec(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().unwrap_or("");

        for token in line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            if let Some((a, b)) = token.split_once('-') {
                let start = parse_port(a)
                    .with_context(|| format!("line {line_no}: invalid start in range: {token}"))?;
                let end = parse_port(b)
                    .with_context(|| format!("line {line_no}: invalid end in range: {token}"))?;
                if start > end {
                    bail!("line {line_no}: invalid range {start}-{end} (start > end)");
                }
                for p in start..=end {
                    if seen.insert(p) {
                        out.push(p);
                    }
                }
                continue;
            }

            let p = parse_port(token)
                .with_context(|| format!("line {line_no}: invalid port value: {token}"))?;
            if seen.insert(p) {
                out.push(p);
            }
        }
    }

    Ok(out)
}

fn parse_port(s: &str) -> Result<u16> {
    let val: u32 = s.trim().parse()?;
    if val < u32::from(MIN_PORT) || val > u32::from(MAX_PORT) {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
