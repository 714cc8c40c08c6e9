use anyhow::{Context, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::time::Duration;

/// Read target URIs from a reader, one per line.
///
/// Blank lines and `#` comments are skipped; order is preserved.
pub fn parse_targets<R: BufRead>(reader: R) -> io::Result<Vec<String>> {
    let mut targets = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        targets.push(line.to_string());
    }

    Ok(targets)
}

/// Load the target list file
pub fn read_targets(path: &Path) -> io::Result<Vec<String>> {
    let file = File::open(path)?;
    parse_targets(BufReader::new(file))
}

/// Load a request body payload in full
pub fn read_body(path: &Path) -> io::Result<Bytes> {
    std::fs::read(path).map(Bytes::from)
}

/// Get a writer for a file or stdout
pub fn get_writer(path: &str) -> Result<Box<dyn Write>> {
    if path == "stdout" {
        Ok(Box::new(io::stdout()))
    } else {
        let file = File::create(path).context(format!("Failed to create file: {}", path))?;
        Ok(Box::new(file))
    }
}

/// Parse a run period: plain seconds (`30`) or a human duration (`1m30s`, `500ms`)
pub fn parse_period(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(value).map_err(|err| format!("invalid period '{}': {}", value, err))
}
