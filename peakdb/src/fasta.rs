//! Random-access reading of indexed FASTA files.
//!
//! Every worker opens its own handle: the underlying file position is
//! mutated on every query, so a handle must never be shared across OS
//! processes or threads.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use noodles::core::{Position, Region};
use noodles::fasta::{self, fai};

use crate::error::Result;

/// A random-access handle over one reference assembly.
pub struct FastaReader {
    reader: fasta::IndexedReader<BufReader<File>>,
}

impl FastaReader {
    /// Open an indexed FASTA file. The `.fai` sidecar is used when present,
    /// otherwise the index is computed in memory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let fai_path = {
            let mut p = path.as_os_str().to_owned();
            p.push(".fai");
            PathBuf::from(p)
        };

        let index = if fai_path.exists() {
            fai::read(fai_path)?
        } else {
            fasta::index(path)?
        };

        let reader = File::open(path)
            .map(BufReader::new)
            .map(|inner| fasta::IndexedReader::new(inner, index))?;

        Ok(FastaReader { reader })
    }

    /// Fetch the bases of `chrom[start..end)` (0-based, half-open).
    pub fn fetch(&mut self, chrom: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        let begin = Position::try_from(start as usize + 1)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let last = Position::try_from(end as usize)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let region = Region::new(chrom, begin..=last);
        let record = self.reader.query(&region)?;

        Ok(record.sequence().as_ref().to_vec())
    }
}

/// Scan a FASTA file sequentially and report every `(name, length)` in file
/// order. Used once per assembly at registration time.
pub fn scan_sequences<P: AsRef<Path>>(path: P) -> Result<Vec<(String, u64)>> {
    let mut reader = File::open(path)
        .map(BufReader::new)
        .map(fasta::Reader::new)?;

    let mut sequences = Vec::new();
    for result in reader.records() {
        let record = result?;
        sequences.push((record.name().to_string(), record.sequence().len() as u64));
    }

    Ok(sequences)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn write_fasta(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("toy.fa");
        let mut fp = File::create(&path).unwrap();
        writeln!(fp, ">chr1").unwrap();
        writeln!(fp, "ACGTACGTAC").unwrap();
        writeln!(fp, ">chr2").unwrap();
        writeln!(fp, "TTTTGGGGCC").unwrap();
        path
    }

    #[test]
    fn test_scan_sequences() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fasta(&dir);
        let sequences = scan_sequences(&path)?;
        assert_eq!(
            sequences,
            vec![("chr1".to_string(), 10), ("chr2".to_string(), 10)]
        );
        Ok(())
    }

    #[test]
    fn test_fetch_without_sidecar_index() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fasta(&dir);
        let mut reader = FastaReader::open(&path)?;
        assert_eq!(reader.fetch("chr1", 0, 4)?, b"ACGT");
        assert_eq!(reader.fetch("chr1", 4, 10)?, b"ACGTAC");
        assert_eq!(reader.fetch("chr2", 8, 10)?, b"CC");
        Ok(())
    }
}
