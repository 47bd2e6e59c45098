/**
 * peakdb stores genomic interval annotations (BED / narrowPeak / bedGraph)
 * in SQLite next to reference-assembly metadata, and serves (one-hot
 * sequence, label) pairs by flat index to machine-learning training loops.
 *
 * All chromosomes of all registered assemblies share one global coordinate
 * line, so interval overlap queries run against a single spatial index with
 * absolute integer coordinates.
 **/
mod chrom;
mod error;
mod fasta;
mod onehot;
mod parse;

pub mod dataset;
pub mod store;

pub use chrom::Chrom;
pub use dataset::{Aggregate, Dataset, DatasetBuilder, Label, LabelKind, Site};
pub use error::{Error, Result};
pub use fasta::FastaReader;
pub use onehot::encode;
pub use parse::{read_records, DataFormat, DataRecord};
pub use store::{AssemblyInfo, ConditionInfo, IntervalHit, Selection, Store};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
