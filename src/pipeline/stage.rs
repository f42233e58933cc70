//! Running a processing chain over one file's contents.
//!
//! Each stage receives the previous stage's output on stdin and writes its
//! own result to stdout. A stage resolves to, in order:
//!
//! 1. the command configured under `[build.stages]`
//! 2. a built-in (`minify-html`)
//! 3. identity, for names with no command

use super::dispatch::Chain;
use crate::{config::SiteConfig, log};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::{
    collections::BTreeMap,
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    sync::LazyLock,
};
use thiserror::Error;

pub const MINIFY_HTML: &str = "minify-html";

/// Stage names already reported as pass-through in this process.
static IDENTITY_STAGES: LazyLock<Mutex<FxHashSet<String>>> =
    LazyLock::new(|| Mutex::new(FxHashSet::default()));

#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage `{stage}` could not start `{program}` for {}", file.display())]
    Spawn {
        stage: String,
        program: String,
        file: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("stage `{stage}` failed on {} ({status}){}", file.display(), indent(stderr))]
    Failed {
        stage: String,
        file: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{} imports `{specifier}`, but {} does not exist", importer.display(), expected.display())]
    MissingStyle {
        importer: PathBuf,
        specifier: String,
        expected: PathBuf,
    },

    #[error("failed to read {}", file.display())]
    Read {
        file: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn indent(stderr: &str) -> String {
    if stderr.is_empty() {
        return String::new();
    }
    stderr.lines().fold(String::new(), |mut acc, line| {
        acc.push_str("\n  ");
        acc.push_str(line);
        acc
    })
}

/// What a stage is being run for; exported to commands as environment.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub page: Option<&'a str>,
    pub file: &'a Path,
}

/// Stage name → command table, bound to the working directory commands run in.
#[derive(Debug, Clone)]
pub struct Toolchain {
    commands: BTreeMap<String, Vec<String>>,
    root: PathBuf,
}

impl Toolchain {
    pub fn new(commands: BTreeMap<String, Vec<String>>, root: PathBuf) -> Self {
        Self { commands, root }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(config.build.stages.clone(), config.get_root().to_path_buf())
    }

    /// Feed `input` through every stage of `chain` in order.
    pub fn run(&self, chain: &Chain, input: Vec<u8>, ctx: &StageContext<'_>) -> Result<Vec<u8>, StageError> {
        chain
            .stages
            .iter()
            .try_fold(input, |data, stage| self.run_stage(stage, data, ctx))
    }

    fn run_stage(&self, stage: &str, input: Vec<u8>, ctx: &StageContext<'_>) -> Result<Vec<u8>, StageError> {
        if let Some(argv) = self.commands.get(stage) {
            return self.spawn(stage, argv, input, ctx);
        }
        if stage == MINIFY_HTML {
            return Ok(minify_html(&input));
        }
        if IDENTITY_STAGES.lock().insert(stage.to_owned()) {
            log!("stage"; "`{stage}` has no command, passing input through");
        }
        Ok(input)
    }

    fn spawn(
        &self,
        stage: &str,
        argv: &[String],
        input: Vec<u8>,
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, StageError> {
        let spawn_error = |program: &str, source: io::Error| StageError::Spawn {
            stage: stage.to_owned(),
            program: program.to_owned(),
            file: ctx.file.to_path_buf(),
            source,
        };

        let Some((program, args)) = argv.split_first() else {
            return Err(spawn_error(
                "",
                io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
            ));
        };

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .env("PAGEKIT_STAGE", stage)
            .env("PAGEKIT_SOURCE", ctx.file)
            .env("PAGEKIT_PAGE", ctx.page.unwrap_or_default())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| spawn_error(program, err))?;

        // Feed stdin from a second thread so a chatty child can't fill its
        // stdout pipe while we're still blocked writing.
        let stdin = child.stdin.take();
        let output = std::thread::scope(|scope| {
            if let Some(mut stdin) = stdin {
                scope.spawn(move || {
                    // A child that exits without reading is reported through its status.
                    let _ = stdin.write_all(&input);
                });
            }
            child.wait_with_output()
        })
        .map_err(|err| spawn_error(program, err))?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        if !output.status.success() {
            return Err(StageError::Failed {
                stage: stage.to_owned(),
                file: ctx.file.to_path_buf(),
                status: output.status,
                stderr,
            });
        }
        if !stderr.is_empty() {
            log!(stage; "{}", stderr);
        }
        Ok(output.stdout)
    }
}

fn minify_html(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    minify_html::minify(html, &cfg)
}
