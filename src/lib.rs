#![cfg_attr(feature = "nightly", feature(portable_simd))]
//! Four-way equi-join over flat `key,payload` files.
//!
//! ```text
//!  file ──► Table (scan + tokenize)
//!                │
//!                ▼
//!  [ partition ─► materialize ─► join ─► project ] × stages of a JoinPlan
//!                │
//!                ▼
//!           write_relation
//! ```
//!
//! Every relation owns its byte buffer and stores fields as [`ByteSpan`]s
//! into it. Joining two relations copies both into one fresh buffer first, so
//! key comparisons never mix buffers.

pub mod config;
pub mod error;
pub mod hash;
pub mod join;
pub mod materialize;
pub mod output;
pub mod partition;
pub mod pipeline;
pub mod plan;
pub mod scan;
pub mod span;
pub mod table;

pub use config::JoinConfig;
pub use error::{Error, MalformedReason, Result};
pub use join::hash_join;
pub use pipeline::{execute, load_tables, run};
pub use plan::{JoinPlan, JoinStage, Source};
pub use scan::Scanner;
pub use span::{ByteSpan, Relation};
pub use table::Table;
