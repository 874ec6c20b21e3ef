//! Media-library query engine.
//!
//! Callers describe the shape of the data they want with a JSON fetch spec
//! (`metadata`, `cluster-list`, `cluster-dict`, `organize`, `count`), pick
//! the entries with a [`Collection`], and get back a nested [`Value`] tree.
//!
//! ```rust
//! use medialib::{Collection, Medialib, MedialibConfig, Value};
//! use serde_json::json;
//!
//! let lib = Medialib::open(MedialibConfig::default())?;
//! let mut session = lib.begin_write();
//! for n in 1..=4 {
//!     let id = session.entry_new(&format!("file:///red-fang/{n}.ogg"))?;
//!     session.property_set_int(id, "tracknr", n, "plugin/id3v2")?;
//! }
//! session.commit()?;
//!
//! let fetch = json!({"type": "metadata", "get": ["value"], "fields": ["tracknr"], "aggregate": "sum"});
//! assert_eq!(lib.query(&Collection::universe(), &fetch)?, Some(Value::Int(10)));
//! # Ok::<(), medialib::MedialibError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod medialib;
pub mod query;
pub mod storage;

pub use crate::error::{ErrorKind, ErrorWithCode, MedialibError, Result};
pub use crate::medialib::{Medialib, MedialibConfig, Session, SessionMode, SessionState};
pub use crate::query::{
    compile, query_profile_snapshot, CompiledSpec, Dict, Executor, FetchInfo, QueryProfileSnapshot,
    Value,
};
pub use crate::storage::{Collection, Scalar, SourcePreference, Store};
