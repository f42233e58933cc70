//! Per-file processing: which chain a file goes through, and running it.

pub mod alias;
pub mod dispatch;
pub mod stage;
pub mod styles;

pub use alias::AliasTable;
pub use dispatch::{Chain, Dispatch, Dispatcher};
pub use stage::{StageContext, StageError, Toolchain};
