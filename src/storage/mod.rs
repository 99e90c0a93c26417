//! Storage layer for Refinr.
//!
//! - [`JsonlStorage`]: append-only JSONL collections backing the run ledger
//! - [`FsArtifactStore`]: artifact text files with a document id header

mod artifacts;
mod jsonl;
mod traits;

pub use artifacts::{ArtifactStore, FsArtifactStore, split_header, with_header};
pub use jsonl::JsonlStorage;
pub use traits::{AppendStore, Filter, FilterOp, HasId};
