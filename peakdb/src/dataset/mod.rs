//! The positional dataset facade: a length-bearing, randomly indexable view
//! over the store that yields `(one-hot sequence, label)` pairs.
//!
//! The coordinate space and all window positions are computed once, in the
//! process that builds the dataset, and are read-only afterwards. Store
//! resources (SQLite connection + FASTA handles) are duplicated lazily per
//! worker, keyed by process and thread identity, because neither survives
//! sharing across OS processes.

mod coord;
mod labeler;
mod sampler;

pub use coord::{CoordinateSpace, Pair, Site};
pub use labeler::{Aggregate, Label, LabelKind, Labeler};
pub use sampler::Positions;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex};
use std::thread;

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::onehot;
use crate::store::{Selection, Store};

/// The configuration surface of a dataset. All validation happens in
/// [`DatasetBuilder::build`]; a failed build leaves nothing behind.
pub struct DatasetBuilder {
    source: PathBuf,
    selection: Selection,
    window: u64,
    stride: Option<u64>,
    random_count: Option<usize>,
    kind: LabelKind,
    aggregate: Aggregate,
    in_memory: bool,
}

impl DatasetBuilder {
    pub fn new<P: AsRef<Path>>(source: P) -> DatasetBuilder {
        DatasetBuilder {
            source: source.as_ref().to_owned(),
            selection: Selection::all(),
            window: 200,
            stride: None,
            random_count: None,
            kind: LabelKind::Regions,
            aggregate: Aggregate::Any,
            in_memory: false,
        }
    }

    /// Restrict which chromosomes participate.
    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Window length in base pairs (default 200).
    pub fn window(mut self, window: u64) -> Self {
        self.window = window;
        self
    }

    /// Use evenly strided window positions.
    pub fn stride(mut self, stride: u64) -> Self {
        self.stride = Some(stride);
        self
    }

    /// Use randomly drawn window positions, proportional to chromosome size.
    pub fn random_count(mut self, count: usize) -> Self {
        self.random_count = Some(count);
        self
    }

    pub fn kind(mut self, kind: LabelKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// Snapshot the store into memory per worker; disables writes.
    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    pub fn build(self) -> Result<Dataset> {
        if self.window == 0 {
            return Err(Error::Config("the window length must be positive".to_string()));
        }
        let positions = match (self.stride, self.random_count) {
            (Some(stride), None) => {
                if stride == 0 {
                    return Err(Error::Config("the stride must be positive".to_string()));
                }
                Positions::Strided { stride }
            }
            (None, Some(count)) => {
                if count == 0 {
                    return Err(Error::Config(
                        "the number of random positions must be positive".to_string(),
                    ));
                }
                Positions::Random { count }
            }
            _ => {
                return Err(Error::Config(
                    "choose either a stride or a number of random positions".to_string(),
                ))
            }
        };
        match (self.kind, self.aggregate) {
            (LabelKind::Values, Aggregate::None) => (),
            (LabelKind::Values, _) => {
                return Err(Error::Config(
                    "quantitative labels cannot be reduced; use the unreduced aggregation"
                        .to_string(),
                ))
            }
            (_, Aggregate::None) => {
                return Err(Error::Config(
                    "the unreduced aggregation is only valid for quantitative labels".to_string(),
                ))
            }
            _ => (),
        }

        let store = if self.in_memory {
            Store::open_in_memory_copy(&self.source)?
        } else {
            Store::open(&self.source)?
        };

        let candidates = store
            .chromosomes(&self.selection)?
            .into_iter()
            .map(|(assembly, chromosome_id, chrom)| Pair {
                assembly,
                chromosome_id,
                chrom,
            })
            .collect();
        let (pairs, starts) = positions.sample(candidates, self.window);
        let space = CoordinateSpace::new(pairs, starts, self.window);

        let condition_ids: Vec<i64> = store.conditions()?.iter().map(|c| c.id).collect();
        let labeler = Labeler::new(
            self.window as usize,
            self.kind,
            self.aggregate,
            &condition_ids,
        );

        // the constructing worker keeps the store it already opened
        let mut workers = HashMap::new();
        workers.insert(worker_id(), Arc::new(Mutex::new(store)));

        Ok(Dataset {
            source: self.source,
            in_memory: self.in_memory,
            space,
            labeler,
            workers: Mutex::new(workers),
        })
    }
}

/// Identity of the calling worker. Forked workers differ by process id,
/// threaded workers by thread id.
fn worker_id() -> String {
    format!("{}-{:?}", process::id(), thread::current().id())
}

/// A positional dataset over the annotation store.
pub struct Dataset {
    source: PathBuf,
    in_memory: bool,
    space: CoordinateSpace,
    labeler: Labeler,
    workers: Mutex<HashMap<String, Arc<Mutex<Store>>>>,
}

impl Dataset {
    /// Total number of windows.
    pub fn len(&self) -> usize {
        self.space.len()
    }

    pub fn is_empty(&self) -> bool {
        self.space.is_empty()
    }

    pub fn coordinate_space(&self) -> &CoordinateSpace {
        &self.space
    }

    /// Map a flat index to its genomic window without fetching anything.
    pub fn resolve(&self, index: usize) -> Result<Site> {
        self.space.resolve(index)
    }

    /// The calling worker's private store bundle, created on first use and
    /// cached for the worker's lifetime. The registry lock only covers the
    /// lookup; workers do not serialize each other's queries.
    fn worker_store(&self) -> Result<Arc<Mutex<Store>>> {
        let key = worker_id();
        let mut workers = self.workers.lock().unwrap();
        if let Some(store) = workers.get(&key) {
            return Ok(Arc::clone(store));
        }

        let store = if self.in_memory {
            Store::open_in_memory_copy(&self.source)?
        } else {
            Store::open(&self.source)?
        };
        let store = Arc::new(Mutex::new(store));
        workers.insert(key, Arc::clone(&store));
        Ok(store)
    }

    /// Fetch the one-hot encoded sequence and the label of one window.
    pub fn get(&self, index: usize) -> Result<(Array2<bool>, Label)> {
        let site = self.space.resolve(index)?;

        let store = self.worker_store()?;
        let mut store = store.lock().unwrap();

        let sequence = store.sequence(&site.assembly, &site.chrom, site.start, site.end)?;
        let encoded = onehot::encode(&sequence)?;

        let abs_start = site.offset + site.start;
        let abs_end = site.offset + site.end;
        let hits = store.query_overlap(abs_start, abs_end)?;
        let label = self.labeler.label(&hits, site.chromosome_id, abs_start);

        Ok((encoded, label))
    }

    /// Iterate every window in index order.
    pub fn iter(&self) -> impl Iterator<Item = Result<(Array2<bool>, Label)>> + '_ {
        (0..self.len()).map(move |index| self.get(index))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rayon::prelude::*;
    use std::fs::File;
    use std::io::Write;

    /// The §8-style fixture: one assembly, two chromosomes of 40 bp, one
    /// interval [20, 40) on the second chromosome.
    fn e2e_store(dir: &Path) -> PathBuf {
        let fasta = dir.join("assembly1.fa");
        let mut fp = File::create(&fasta).unwrap();
        writeln!(fp, ">chr1").unwrap();
        writeln!(fp, "{}", "A".repeat(40)).unwrap();
        writeln!(fp, ">chr2").unwrap();
        writeln!(fp, "{}", "ACGT".repeat(10)).unwrap();
        drop(fp);

        let bed = dir.join("peaks.bed");
        let mut fp = File::create(&bed).unwrap();
        writeln!(fp, "chr2\t20\t40").unwrap();
        drop(fp);

        let db = dir.join("test.db");
        let mut store = Store::open(&db).unwrap();
        store.add_assembly(&fasta, None, None).unwrap();
        store.add_data(&bed, "assembly1", None).unwrap();
        db
    }

    fn mask(label: Label) -> Vec<bool> {
        match label {
            Label::Mask(mask) => mask.to_vec(),
            Label::Dense(_) => panic!("expected a reduced label"),
        }
    }

    #[test]
    fn test_strided_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let db = e2e_store(dir.path());

        let dataset = DatasetBuilder::new(&db)
            .window(10)
            .stride(10)
            .build()
            .unwrap();

        // two chromosomes of 40 bp, four windows each
        assert_eq!(dataset.len(), 8);

        for index in 0..8 {
            let (sequence, label) = dataset.get(index).unwrap();
            assert_eq!(sequence.dim(), (10, 4));
            // windows 6 and 7 cover the [20, 40) interval on chr2
            assert_eq!(mask(label), vec![index >= 6], "window {}", index);
        }

        // the first window is all A
        let (sequence, _) = dataset.get(0).unwrap();
        assert!((0..10).all(|row| sequence[[row, 0]]));

        assert!(matches!(
            dataset.get(8),
            Err(Error::IndexOutOfRange { index: 8, len: 8 })
        ));
    }

    #[test]
    fn test_identical_builds_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let db = e2e_store(dir.path());

        let build = || {
            DatasetBuilder::new(&db)
                .window(10)
                .stride(3)
                .build()
                .unwrap()
        };
        let first = build();
        let second = build();

        assert_eq!(first.len(), second.len());
        assert_eq!(first.coordinate_space().pairs(), second.coordinate_space().pairs());
        for pair in 0..first.coordinate_space().pairs().len() {
            assert_eq!(
                first.coordinate_space().positions(pair),
                second.coordinate_space().positions(pair)
            );
        }
    }

    #[test]
    fn test_empty_selection_yields_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let db = e2e_store(dir.path());

        let dataset = DatasetBuilder::new(&db)
            .selection(Selection::all().assembly("no-such-assembly"))
            .window(10)
            .stride(10)
            .build()
            .unwrap();

        assert_eq!(dataset.len(), 0);
        assert!(dataset.get(0).is_err());
    }

    #[test]
    fn test_configuration_errors() {
        let dir = tempfile::tempdir().unwrap();
        let db = e2e_store(dir.path());

        let build = |builder: DatasetBuilder| builder.build().err();

        // neither or both position policies
        assert!(matches!(
            build(DatasetBuilder::new(&db).window(10)),
            Some(Error::Config(_))
        ));
        assert!(matches!(
            build(DatasetBuilder::new(&db).window(10).stride(5).random_count(5)),
            Some(Error::Config(_))
        ));
        // quantitative labels must stay unreduced, mask labels must reduce
        assert!(matches!(
            build(DatasetBuilder::new(&db).window(10).stride(5).kind(LabelKind::Values)),
            Some(Error::Config(_))
        ));
        assert!(matches!(
            build(DatasetBuilder::new(&db).window(10).stride(5).aggregate(Aggregate::None)),
            Some(Error::Config(_))
        ));
        assert!(matches!(
            build(DatasetBuilder::new(&db).window(0).stride(5)),
            Some(Error::Config(_))
        ));
    }

    #[test]
    fn test_random_dataset_has_requested_length() {
        let dir = tempfile::tempdir().unwrap();
        let db = e2e_store(dir.path());

        let dataset = DatasetBuilder::new(&db)
            .window(10)
            .random_count(50)
            .build()
            .unwrap();
        assert_eq!(dataset.len(), 50);

        for result in dataset.iter() {
            let (sequence, _) = result.unwrap();
            assert_eq!(sequence.dim(), (10, 4));
        }
    }

    #[test]
    fn test_concurrent_pulls_duplicate_resources() {
        let dir = tempfile::tempdir().unwrap();
        let db = e2e_store(dir.path());

        let dataset = DatasetBuilder::new(&db)
            .window(10)
            .stride(10)
            .build()
            .unwrap();

        let labels: Vec<Vec<bool>> = (0..dataset.len())
            .into_par_iter()
            .map(|index| mask(dataset.get(index).unwrap().1))
            .collect();

        assert_eq!(labels.len(), 8);
        for (index, label) in labels.iter().enumerate() {
            assert_eq!(label, &vec![index >= 6]);
        }

        // every pulling thread received its own store bundle
        let workers = dataset.workers.lock().unwrap();
        assert!(workers.len() > 1);
    }

    #[test]
    fn test_in_memory_copy_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let db = e2e_store(dir.path());

        let dataset = DatasetBuilder::new(&db)
            .window(10)
            .stride(10)
            .in_memory(true)
            .build()
            .unwrap();
        assert_eq!(dataset.len(), 8);
        assert_eq!(mask(dataset.get(7).unwrap().1), vec![true]);
    }
}
