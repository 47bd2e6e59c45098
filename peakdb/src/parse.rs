//! Parsers for the supported annotation file formats.
//!
//! These are deliberately thin: tab-separated columns, comment and header
//! lines skipped, malformed lines dropped with a single warning per file.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use flate2::read::MultiGzDecoder;
use log::warn;

use crate::error::{Error, Result};

/// The annotation formats the store accepts, optionally gzip-compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// BED3+: chrom, start, end
    Bed,
    /// ENCODE narrowPeak: BED6 + signal, p-value, q-value, summit offset
    NarrowPeak,
    /// bedGraph: chrom, start, end, value
    BedGraph,
}

impl DataFormat {
    /// Detect the format from the file name. This runs before any parsing
    /// begins; an extension outside the supported set is an error.
    pub fn detect(path: &Path) -> Result<(DataFormat, bool)> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_lowercase();

        let (name, gzip) = match name.strip_suffix(".gz") {
            Some(stem) => (stem, true),
            None => (name.as_str(), false),
        };

        let format = match name.rsplit('.').next().unwrap_or("") {
            "bed" => DataFormat::Bed,
            "narrowpeak" => DataFormat::NarrowPeak,
            "bedgraph" => DataFormat::BedGraph,
            _ => return Err(Error::UnsupportedFormat(path.display().to_string())),
        };

        Ok((format, gzip))
    }
}

/// One parsed annotation record, in chromosome-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    /// Point-feature position relative to `start` (narrowPeak summit)
    pub summit: Option<u64>,
    /// Quantitative track value (bedGraph)
    pub value: Option<f64>,
}

fn open_reader(path: &Path, gzip: bool) -> Result<Box<dyn BufRead>> {
    let fp = File::open(path)?;
    Ok(if gzip {
        Box::new(BufReader::new(MultiGzDecoder::new(fp)))
    } else {
        Box::new(BufReader::new(fp))
    })
}

fn parse_line(format: DataFormat, line: &str) -> Option<DataRecord> {
    let fields: Vec<_> = line.trim_end().split('\t').collect();
    let columns = match format {
        DataFormat::Bed => 3,
        DataFormat::NarrowPeak => 10,
        DataFormat::BedGraph => 4,
    };
    if fields.len() < columns {
        return None;
    }

    let chrom = fields[0].to_owned();
    let start: u64 = fields[1].parse().ok()?;
    let end: u64 = fields[2].parse().ok()?;
    if start >= end {
        return None;
    }

    let (summit, value) = match format {
        DataFormat::Bed => (None, None),
        // a summit of -1 means "not called"
        DataFormat::NarrowPeak => match fields[9].parse::<i64>().ok()? {
            summit if summit >= 0 => (Some(summit as u64), None),
            _ => (None, None),
        },
        DataFormat::BedGraph => (None, Some(fields[3].parse::<f64>().ok()?)),
    };

    Some(DataRecord {
        chrom,
        start,
        end,
        summit,
        value,
    })
}

/// Read every record of an annotation file. The format is detected from the
/// file name; gzip input is decompressed transparently.
pub fn read_records(path: &Path) -> Result<Vec<DataRecord>> {
    let (format, gzip) = DataFormat::detect(path)?;
    let reader = open_reader(path, gzip)?;

    let mut records = Vec::new();
    let mut warned = false;
    for line in reader.lines() {
        let line = line?;
        if line.is_empty()
            || line.starts_with('#')
            || line.starts_with("track")
            || line.starts_with("browser")
        {
            continue;
        }
        match parse_line(format, &line) {
            Some(record) => records.push(record),
            None => {
                if !warned {
                    warn!("{}: invalid input line: {}", path.display(), line.trim_end());
                    warned = true;
                }
            }
        }
    }

    Ok(records)
}
