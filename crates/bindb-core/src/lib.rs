//! bindb-core: the storage engine behind an embedded single-node
//! key-addressed record store (see `SPEC_FULL.md` §1-§9 for the full design).
//!
//! Dependency order, leaves first: [`id`] and [`column`]/[`value`], then
//! [`schema`] and [`codec`], then [`slot`]/[`cache`]/[`buffer`]/[`fileio`],
//! then [`table`], and finally [`database`].

pub mod buffer;
pub mod cache;
pub mod codec;
pub mod column;
pub mod config;
pub mod database;
pub mod error;
pub mod fileio;
pub mod id;
pub mod schema;
pub mod slot;
pub mod table;
pub mod value;

pub use column::{ColumnDef, ColumnType};
pub use database::Database;
pub use error::{ErrorKind, Result, StoreError};
pub use id::Id;
pub use schema::{RecordLayout, Schema};
pub use table::{Table, TableStats};
pub use value::{Row, Value};
