//! loglake: date-partitioned ingestion of newline-delimited JSON event
//! logs from a remote object store into a local Parquet lake, plus a
//! merge step that flattens the per-date partitions into one
//! analysis-ready wide table.
//!
//! The two non-trivial pieces are the resumable ingestion pass
//! ([`ingest`]/[`partition`]) that groups remote objects by their
//! embedded `y=YYYY/m=MM/d=DD` date key without re-downloading
//! already-processed data, and the recursive structural flattener
//! ([`flatten`]) that turns nested list/struct columns into flat
//! scalar columns while preserving row identity.

pub mod config;
pub mod datekey;
pub mod error;
pub mod fetch;
pub mod flatten;
pub mod ingest;
pub mod merge;
pub mod partition;
pub mod store;
pub mod table;
pub mod timer;

pub use crate::config::{LakeConfig, SourceConfig, create_example_config, load_config};
pub use crate::error::LakeError;
pub use crate::ingest::{IngestOptions, IngestReport, ingest_source};
pub use crate::merge::{MergeOutcome, merge_partitions};
pub use crate::partition::PartitionSink;
pub use crate::store::{SourceStore, build_source_store};
pub use crate::table::{JsonRow, WideTable};
pub use crate::timer::ScopedTimer;
