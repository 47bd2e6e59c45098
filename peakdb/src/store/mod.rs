//! The SQLite-backed annotation store.
//!
//! A [`Store`] bundles one database connection with one open FASTA handle
//! per registered assembly. The bundle is cheap to duplicate and is exactly
//! what each data-loading worker owns privately; neither the connection nor
//! the FASTA handles may be shared across OS processes.

mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::chrom::Chrom;
use crate::error::{Error, Result};
use crate::fasta::{self, FastaReader};
use crate::parse;

/// A registered reference assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyInfo {
    pub id: i64,
    pub name: String,
    pub species: String,
    pub path: PathBuf,
    /// Total number of base pairs over all chromosomes
    pub size: u64,
}

/// An experimental condition; intervals loaded without one belong to the
/// sentinel row whose name is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionInfo {
    pub id: i64,
    pub name: Option<String>,
}

/// One interval returned by an overlap query, in absolute coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalHit {
    pub chromosome_id: i64,
    pub condition_id: i64,
    pub start: u64,
    pub end: u64,
    pub summit: Option<u64>,
    pub value: Option<f64>,
}

/// Restricts which chromosomes participate in a dataset. Compiled to a
/// parameterized query; an empty selection matches everything.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    assembly: Option<String>,
    species: Option<String>,
    chromosomes: Option<Vec<String>>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn assembly<S: Into<String>>(mut self, name: S) -> Self {
        self.assembly = Some(name.into());
        self
    }

    pub fn species<S: Into<String>>(mut self, name: S) -> Self {
        self.species = Some(name.into());
        self
    }

    pub fn chromosomes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, names: I) -> Self {
        self.chromosomes = Some(names.into_iter().map(Into::into).collect());
        self
    }

    fn to_sql(&self) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(assembly) = &self.assembly {
            clauses.push("Ass.Assembly = ?".to_string());
            values.push(assembly.clone());
        }
        if let Some(species) = &self.species {
            clauses.push("Ass.Species = ?".to_string());
            values.push(species.clone());
        }
        if let Some(chromosomes) = &self.chromosomes {
            if chromosomes.is_empty() {
                clauses.push("1 = 0".to_string());
            } else {
                let marks = vec!["?"; chromosomes.len()].join(", ");
                clauses.push(format!("Chr.Chromosome IN ({})", marks));
                values.extend(chromosomes.iter().cloned());
            }
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

/// One connection to the annotation store plus the FASTA handles of every
/// registered assembly.
pub struct Store {
    conn: Connection,
    path: PathBuf,
    read_only: bool,
    fastas: HashMap<String, FastaReader>,
}

impl Store {
    /// Open (creating tables if needed) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Store> {
        Self::open_impl(path.as_ref(), false)
    }

    /// Open the store at `path` and snapshot it into a private in-memory
    /// database. The copy is read-only; queries no longer touch the disk.
    pub fn open_in_memory_copy<P: AsRef<Path>>(path: P) -> Result<Store> {
        Self::open_impl(path.as_ref(), true)
    }

    fn open_impl(path: &Path, in_memory: bool) -> Result<Store> {
        let disk = Connection::open(path)?;
        for table in schema::ALL {
            disk.execute(table, [])?;
        }

        let conn = if in_memory {
            let mut copy = Connection::open_in_memory()?;
            {
                let backup = rusqlite::backup::Backup::new(&disk, &mut copy)?;
                backup.run_to_completion(64, Duration::from_millis(0), None)?;
            }
            copy
        } else {
            disk
        };

        let mut store = Store {
            conn,
            path: path.to_owned(),
            read_only: in_memory,
            fastas: HashMap::new(),
        };

        for assembly in store.assemblies()? {
            let reader = FastaReader::open(&assembly.path)?;
            store.fastas.insert(assembly.name, reader);
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::Config(
                "the store was opened as an in-memory copy and is read-only".to_string(),
            ));
        }
        Ok(())
    }

    /// Register a reference assembly from a FASTA file. The assembly name
    /// defaults to the first dot-separated component of the file name, the
    /// species to the assembly name. Every sequence in the file becomes a
    /// chromosome with a sequential global offset.
    pub fn add_assembly(
        &mut self,
        fasta_file: &Path,
        name: Option<&str>,
        species: Option<&str>,
    ) -> Result<i64> {
        self.check_writable()?;

        let default_name = fasta_file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .split('.')
            .next()
            .unwrap_or("")
            .to_string();
        let name = name.unwrap_or(&default_name);
        let species = species.unwrap_or(name);

        if self.assembly_id(name).is_ok() {
            return Err(Error::DuplicateAssembly(name.to_string()));
        }

        let sequences = fasta::scan_sequences(fasta_file)?;
        let total: u64 = sequences.iter().map(|(_, size)| size).sum();

        let mut offset: u64 = self.conn.query_row(
            "SELECT COALESCE(MAX(Offset + Size), 0) FROM Chromosome",
            [],
            |row| row.get::<_, i64>(0),
        )? as u64;
        if offset + total > i32::MAX as u64 {
            return Err(Error::CoordinateOverflow(name.to_string()));
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO Assembly (Assembly, Species, AbsPath, Size) VALUES (?1, ?2, ?3, ?4)",
            params![name, species, fasta_file.display().to_string(), total as i64],
        )?;
        let assembly_id = tx.last_insert_rowid();

        for (chrom, size) in &sequences {
            tx.execute(
                "INSERT INTO Chromosome (Chromosome, Size, Offset, AssemblyId)
                 VALUES (?1, ?2, ?3, ?4)",
                params![chrom, *size as i64, offset as i64, assembly_id],
            )?;
            offset += size;
        }
        tx.commit()?;

        info!(
            "registered assembly '{}': {} chromosomes, {} bp",
            name,
            sequences.len(),
            total
        );

        self.fastas
            .insert(name.to_string(), FastaReader::open(fasta_file)?);

        Ok(assembly_id)
    }

    /// Load an annotation file for a registered assembly. Coordinates are
    /// shifted onto the global coordinate line before insertion; records on
    /// chromosomes the assembly does not have are skipped.
    pub fn add_data(
        &mut self,
        data_file: &Path,
        assembly: &str,
        condition: Option<&str>,
    ) -> Result<usize> {
        self.check_writable()?;

        // fail on an unsupported extension before anything is parsed
        parse::DataFormat::detect(data_file)?;

        let assembly_id = self.assembly_id(assembly)?;
        let records = parse::read_records(data_file)?;
        let condition_id = self.condition_id_or_create(condition)?;

        let mut chroms: HashMap<String, (i64, u64, u64)> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT Chromosome, ChromosomeId, Offset, Size FROM Chromosome
                 WHERE AssemblyId = ?1",
            )?;
            let rows = stmt.query_map([assembly_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    (
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)? as u64,
                        row.get::<_, i64>(3)? as u64,
                    ),
                ))
            })?;
            for row in rows {
                let (name, info) = row?;
                chroms.insert(name, info);
            }
        }

        let mut inserted = 0;
        let mut warned = false;
        let tx = self.conn.transaction()?;
        for record in records {
            let (chromosome_id, offset, size) = match chroms.get(&record.chrom) {
                Some(info) => *info,
                None => {
                    if !warned {
                        warn!(
                            "{}: chromosome '{}' is not part of assembly '{}', skipping",
                            data_file.display(),
                            record.chrom,
                            assembly
                        );
                        warned = true;
                    }
                    continue;
                }
            };
            if record.end > size {
                if !warned {
                    warn!(
                        "{}: record {}:{}-{} extends past the chromosome end, skipping",
                        data_file.display(),
                        record.chrom,
                        record.start,
                        record.end
                    );
                    warned = true;
                }
                continue;
            }

            tx.execute(
                "INSERT INTO Bed (ChromosomeId, ConditionId, ChromStart, ChromEnd, Summit, DataValue)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    chromosome_id,
                    condition_id,
                    (offset + record.start) as i64,
                    (offset + record.end) as i64,
                    record.summit.map(|s| s as i64),
                    record.value,
                ],
            )?;
            let bed_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO BedVirtual (BedId, ChromStart, ChromEnd) VALUES (?1, ?2, ?3)",
                params![
                    bed_id,
                    (offset + record.start) as i64,
                    (offset + record.end) as i64
                ],
            )?;
            inserted += 1;
        }
        tx.commit()?;

        info!(
            "loaded {} intervals from {} into assembly '{}'",
            inserted,
            data_file.display(),
            assembly
        );

        Ok(inserted)
    }

    fn condition_id_or_create(&mut self, condition: Option<&str>) -> Result<i64> {
        let existing = match condition {
            Some(name) => self
                .conn
                .query_row(
                    "SELECT ConditionId FROM Condition WHERE Condition = ?1",
                    [name],
                    |row| row.get(0),
                )
                .optional()?,
            None => self
                .conn
                .query_row(
                    "SELECT ConditionId FROM Condition WHERE Condition IS NULL",
                    [],
                    |row| row.get(0),
                )
                .optional()?,
        };
        if let Some(id) = existing {
            return Ok(id);
        }

        self.conn
            .execute("INSERT INTO Condition (Condition) VALUES (?1)", params![condition])?;
        Ok(self.conn.last_insert_rowid())
    }

    /// All registered assemblies, in registration order.
    pub fn assemblies(&self) -> Result<Vec<AssemblyInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT AssemblyId, Assembly, Species, AbsPath, Size FROM Assembly
             ORDER BY AssemblyId",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AssemblyInfo {
                id: row.get(0)?,
                name: row.get(1)?,
                species: row.get(2)?,
                path: PathBuf::from(row.get::<_, String>(3)?),
                size: row.get::<_, i64>(4)? as u64,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn assembly_id(&self, name: &str) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT AssemblyId FROM Assembly WHERE Assembly = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound {
                kind: "assembly",
                name: name.to_string(),
            })
    }

    /// Look up one chromosome of an assembly: `(chromosome id, chrom)`.
    pub fn chromosome(&self, assembly: &str, name: &str) -> Result<(i64, Chrom)> {
        let assembly_id = self.assembly_id(assembly)?;
        self.conn
            .query_row(
                "SELECT ChromosomeId, Chromosome, Size, Offset FROM Chromosome
                 WHERE AssemblyId = ?1 AND Chromosome = ?2",
                params![assembly_id, name],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        Chrom {
                            name: row.get(1)?,
                            size: row.get::<_, i64>(2)? as u64,
                            offset: row.get::<_, i64>(3)? as u64,
                        },
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| Error::NotFound {
                kind: "chromosome",
                name: format!("{}/{}", assembly, name),
            })
    }

    /// The chromosomes matching a selection, in registration order:
    /// `(assembly name, chromosome id, chrom)`.
    pub fn chromosomes(&self, selection: &Selection) -> Result<Vec<(String, i64, Chrom)>> {
        let (where_clause, values) = selection.to_sql();
        let sql = format!(
            "SELECT Ass.Assembly, Chr.ChromosomeId, Chr.Chromosome, Chr.Size, Chr.Offset
             FROM Chromosome Chr
             INNER JOIN Assembly Ass ON Chr.AssemblyId = Ass.AssemblyId{}
             ORDER BY Chr.ChromosomeId",
            where_clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                Chrom {
                    name: row.get(2)?,
                    size: row.get::<_, i64>(3)? as u64,
                    offset: row.get::<_, i64>(4)? as u64,
                },
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Look up a condition by name.
    pub fn condition_id(&self, name: &str) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT ConditionId FROM Condition WHERE Condition = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound {
                kind: "condition",
                name: name.to_string(),
            })
    }

    /// All conditions, ordered by id.
    pub fn conditions(&self) -> Result<Vec<ConditionInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT ConditionId, Condition FROM Condition ORDER BY ConditionId")?;
        let rows = stmt.query_map([], |row| {
            Ok(ConditionInfo {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every interval overlapping `[abs_start, abs_end]` on the global
    /// coordinate line. The test is inclusive on both ends; callers clip
    /// half-open, so an interval that merely touches the window boundary
    /// contributes no positions.
    pub fn query_overlap(&self, abs_start: u64, abs_end: u64) -> Result<Vec<IntervalHit>> {
        let mut stmt = self.conn.prepare(
            "SELECT Bed.ChromosomeId, Bed.ConditionId, Bed.ChromStart, Bed.ChromEnd,
                    Bed.Summit, Bed.DataValue
             FROM BedVirtual
             INNER JOIN Bed ON BedVirtual.BedId = Bed.BedId
             WHERE BedVirtual.ChromStart <= ?2 AND BedVirtual.ChromEnd >= ?1",
        )?;
        let rows = stmt.query_map(params![abs_start as i64, abs_end as i64], |row| {
            Ok(IntervalHit {
                chromosome_id: row.get(0)?,
                condition_id: row.get(1)?,
                start: row.get::<_, i64>(2)? as u64,
                end: row.get::<_, i64>(3)? as u64,
                summit: row.get::<_, Option<i64>>(4)?.map(|s| s as u64),
                value: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Length of one chromosome in base pairs.
    pub fn length(&self, assembly: &str, chrom: &str) -> Result<u64> {
        let (_, chrom) = self.chromosome(assembly, chrom)?;
        Ok(chrom.size)
    }

    /// Fetch the bases of `chrom[start..end)` from the assembly's FASTA.
    pub fn sequence(
        &mut self,
        assembly: &str,
        chrom: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>> {
        let reader = self
            .fastas
            .get_mut(assembly)
            .ok_or_else(|| Error::NotFound {
                kind: "assembly",
                name: assembly.to_string(),
            })?;
        reader.fetch(chrom, start, end)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_fasta(dir: &Path, name: &str, chroms: &[(&str, &str)]) -> PathBuf {
        let path = dir.join(name);
        let mut fp = File::create(&path).unwrap();
        for (chrom, seq) in chroms {
            writeln!(fp, ">{}", chrom).unwrap();
            writeln!(fp, "{}", seq).unwrap();
        }
        path
    }

    fn two_assembly_store(dir: &Path) -> Store {
        let fasta1 = write_fasta(
            dir,
            "assembly1.fa",
            &[("chr1", &"A".repeat(10)), ("chr2", &"C".repeat(10))],
        );
        let fasta2 = write_fasta(
            dir,
            "assembly2.fa",
            &[("chr1", &"G".repeat(10)), ("chr3", &"T".repeat(10))],
        );
        let mut store = Store::open(dir.join("test.db")).unwrap();
        store.add_assembly(&fasta1, None, None).unwrap();
        store.add_assembly(&fasta2, None, Some("human")).unwrap();
        store
    }

    #[test]
    fn test_offsets_follow_registration_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = two_assembly_store(dir.path());

        let chroms = store.chromosomes(&Selection::all()).unwrap();
        let offsets: Vec<u64> = chroms.iter().map(|(_, _, c)| c.offset).collect();
        assert_eq!(offsets, vec![0, 10, 20, 30]);
        for window in chroms.windows(2) {
            let (_, _, first) = &window[0];
            let (_, _, second) = &window[1];
            assert_eq!(second.offset, first.offset + first.size);
        }
    }

    #[test]
    fn test_duplicate_assembly_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = two_assembly_store(dir.path());
        let fasta = write_fasta(dir.path(), "dup.fa", &[("chr1", "ACGT")]);
        let result = store.add_assembly(&fasta, Some("assembly1"), None);
        assert!(matches!(result, Err(Error::DuplicateAssembly(_))));
        // the failed call must not have touched existing state
        assert_eq!(store.assemblies().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_names_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = two_assembly_store(dir.path());
        assert!(matches!(
            store.assembly_id("assembly3"),
            Err(Error::NotFound { kind: "assembly", .. })
        ));
        assert!(matches!(
            store.chromosome("assembly1", "chr9"),
            Err(Error::NotFound { kind: "chromosome", .. })
        ));
    }

    #[test]
    fn test_selection_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = two_assembly_store(dir.path());

        let by_assembly = store
            .chromosomes(&Selection::all().assembly("assembly2"))
            .unwrap();
        assert_eq!(by_assembly.len(), 2);
        assert!(by_assembly.iter().all(|(a, _, _)| a == "assembly2"));

        let by_species = store
            .chromosomes(&Selection::all().species("human"))
            .unwrap();
        assert_eq!(by_species.len(), 2);

        let by_name = store
            .chromosomes(&Selection::all().chromosomes(["chr1"]))
            .unwrap();
        assert_eq!(by_name.len(), 2);

        let nothing = store
            .chromosomes(&Selection::all().assembly("assembly1").chromosomes(["chr3"]))
            .unwrap();
        assert!(nothing.is_empty());
    }

    #[test]
    fn test_add_data_and_query_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = two_assembly_store(dir.path());

        let bed = dir.path().join("peaks.bed");
        let mut fp = File::create(&bed).unwrap();
        writeln!(fp, "chr1\t2\t8").unwrap();
        writeln!(fp, "chr2\t0\t10").unwrap();
        writeln!(fp, "chrM\t0\t5").unwrap();
        drop(fp);

        let inserted = store.add_data(&bed, "assembly1", Some("day0")).unwrap();
        assert_eq!(inserted, 2);

        // chr2 of assembly1 sits at offset 10
        let hits = store.query_overlap(10, 19).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!((hits[0].start, hits[0].end), (10, 20));

        // inclusive query bounds: intervals that merely touch a boundary of
        // the window [8, 10) are still returned
        let touching = store.query_overlap(8, 10).unwrap();
        assert_eq!(touching.len(), 2);

        let nothing = store.query_overlap(30, 39).unwrap();
        assert!(nothing.is_empty());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = two_assembly_store(dir.path());
        let result = store.add_data(Path::new("peaks.vcf"), "assembly1", None);
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_condition_sentinel_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = two_assembly_store(dir.path());

        let bed = dir.path().join("peaks.bed");
        let mut fp = File::create(&bed).unwrap();
        writeln!(fp, "chr1\t0\t5").unwrap();
        drop(fp);

        store.add_data(&bed, "assembly1", None).unwrap();
        store.add_data(&bed, "assembly1", Some("day1")).unwrap();
        store.add_data(&bed, "assembly2", None).unwrap();

        let conditions = store.conditions().unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].name, None);
        assert_eq!(conditions[1].name, Some("day1".to_string()));

        assert_eq!(store.condition_id("day1").unwrap(), conditions[1].id);
        assert!(matches!(
            store.condition_id("day9"),
            Err(Error::NotFound { kind: "condition", .. })
        ));
    }

    #[test]
    fn test_in_memory_copy_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = two_assembly_store(dir.path());
            let bed = dir.path().join("peaks.bed");
            let mut fp = File::create(&bed).unwrap();
            writeln!(fp, "chr1\t2\t8").unwrap();
            drop(fp);
            store.add_data(&bed, "assembly1", None).unwrap();
        }

        let mut copy = Store::open_in_memory_copy(dir.path().join("test.db")).unwrap();
        assert_eq!(copy.assemblies().unwrap().len(), 2);
        assert_eq!(copy.query_overlap(0, 9).unwrap().len(), 1);

        let fasta = write_fasta(dir.path(), "extra.fa", &[("chr1", "ACGT")]);
        assert!(copy.add_assembly(&fasta, None, None).is_err());
    }
}
