//! `[build]` section configuration.
//!
//! Page discovery conventions, output filename patterns, processing rules,
//! stage commands and verbatim copy trees.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};

// ============================================================================
// Enums
// ============================================================================

/// Stylesheet extraction granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CssMode {
    /// Every page links one stylesheet built from all pages' style imports (default).
    #[default]
    Shared,
    /// Every page links a stylesheet built only from its own entry's style imports.
    PerPage,
}

// ============================================================================
// Main BuildConfig
// ============================================================================

/// `[build]` section in pagekit.toml.
///
/// # Example
/// ```toml
/// [build]
/// pages = "src/views/pages"     # <page>.ejs
/// entries = "src/_entries"      # <page>.entry.js
/// output = "dist"
/// css_mode = "shared"
///
/// [build.alias]
/// "@scss" = "src/scss"
///
/// [build.stages]
/// sass = ["sass", "--stdin"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Template directory scanned for pages.
    #[serde(default = "defaults::build::pages")]
    #[educe(Default = defaults::build::pages())]
    pub pages: PathBuf,

    /// Directory holding one `<page>.entry.<script_ext>` per page.
    #[serde(default = "defaults::build::entries")]
    #[educe(Default = defaults::build::entries())]
    pub entries: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Template file extension, without the dot.
    #[serde(default = "defaults::build::template_ext")]
    #[educe(Default = defaults::build::template_ext())]
    pub template_ext: String,

    /// Entry script extension, without the dot.
    #[serde(default = "defaults::build::script_ext")]
    #[educe(Default = defaults::build::script_ext())]
    pub script_ext: String,

    /// Output path of each page document; `[name]` is the page id.
    #[serde(default = "defaults::build::html_filename")]
    #[educe(Default = defaults::build::html_filename())]
    pub html_filename: String,

    /// Output path of each page bundle; `[name]` is the chunk name.
    #[serde(default = "defaults::build::script_filename")]
    #[educe(Default = defaults::build::script_filename())]
    pub script_filename: String,

    /// Output path of extracted stylesheets; `[name]` is the stylesheet name.
    #[serde(default = "defaults::build::css_filename")]
    #[educe(Default = defaults::build::css_filename())]
    pub css_filename: String,

    #[serde(default = "defaults::build::css_mode")]
    #[educe(Default = defaults::build::css_mode())]
    pub css_mode: CssMode,

    /// `[name]` of the stylesheet in shared mode.
    #[serde(default = "defaults::build::shared_css_name")]
    #[educe(Default = defaults::build::shared_css_name())]
    pub shared_css_name: String,

    /// Clear the output directory before writing.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub clean: bool,

    /// Import roots resolved to fixed directories (relative to root).
    #[serde(default = "defaults::build::alias")]
    #[educe(Default = defaults::build::alias())]
    pub alias: BTreeMap<String, PathBuf>,

    /// Processing rules, evaluated in order.
    #[serde(default = "defaults::build::rules")]
    #[educe(Default = defaults::build::rules())]
    pub rules: Vec<RuleConfig>,

    /// External command per stage name. Stages without one pass content through.
    #[serde(default)]
    pub stages: BTreeMap<String, Vec<String>>,

    /// Directory trees copied into the output.
    #[serde(default = "defaults::build::copy")]
    #[educe(Default = defaults::build::copy())]
    pub copy: Vec<CopyConfig>,
}

// ============================================================================
// Sub-configurations
// ============================================================================

/// `[[build.rules]]` entry.
///
/// ```toml
/// [[build.rules]]
/// name = "template"
/// test = '\.ejs$'
/// stages = ["ejs", "minify-html"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub name: String,
    /// Regex matched against the `/`-separated file path.
    pub test: String,
    #[serde(default)]
    pub stages: Vec<String>,
}

impl RuleConfig {
    pub fn new(name: &str, test: &str, stages: &[&str]) -> Self {
        Self {
            name: name.into(),
            test: test.into(),
            stages: stages.iter().map(|&s| s.to_owned()).collect(),
        }
    }
}

/// `[[build.copy]]` entry, both paths relative (to root and to output).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyConfig {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl CopyConfig {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}
