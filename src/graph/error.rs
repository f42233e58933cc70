//! Fatal errors raised while deriving the build graph.

use super::catalog::PageId;
use std::{fmt::Write, io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// The template directory is missing or unreadable. No partial catalog is kept.
    #[error("cannot read template directory `{}`", .dir.display())]
    Discovery {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Two template files map to the same page id (compared case-insensitively).
    #[error("duplicate page `{id}`: {}", join_paths(.paths))]
    DuplicatePage { id: PageId, paths: Vec<PathBuf> },

    /// Every page lacking an entry script, in catalog order.
    #[error("{}", describe_missing(.0))]
    MissingEntries(Vec<MissingEntry>),
}

/// A page whose entry script does not exist where the convention expects it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("page `{page}` has no entry script at `{}`", .expected.display())]
pub struct MissingEntry {
    pub page: PageId,
    pub expected: PathBuf,
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("`{}`", p.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_missing(missing: &[MissingEntry]) -> String {
    let mut out = format!(
        "{} page(s) missing an entry script (<entries>/<page>.entry.<ext>):",
        missing.len()
    );
    for entry in missing {
        let _ = write!(out, "\n  {entry}");
    }
    out
}
