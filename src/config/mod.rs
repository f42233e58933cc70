//! Site configuration management for `pagekit.toml`.
//!
//! # Sections
//!
//! | Section           | Purpose                                           |
//! |-------------------|---------------------------------------------------|
//! | `[build]`         | Discovery conventions, output patterns, CSS mode  |
//! | `[build.alias]`   | Import roots for style and script sources         |
//! | `[[build.rules]]` | Ordered file-pattern → processing-chain rules     |
//! | `[build.stages]`  | External command per stage name                   |
//! | `[[build.copy]]`  | Verbatim-copied resource trees                    |
//! | `[serve]`         | Preview server (port, interface, watch)           |
//!
//! # Example
//!
//! ```toml
//! [build]
//! pages = "src/views/pages"
//! entries = "src/_entries"
//! output = "dist"
//!
//! [build.stages]
//! ejs = ["node", "scripts/render-ejs.js"]
//!
//! [serve]
//! port = 5277
//! ```

mod build;
pub mod defaults;
mod error;
mod handle;
mod serve;

pub use build::{CopyConfig, CssMode, RuleConfig};
pub use error::ConfigError;
pub use handle::{cfg, init_config, reload_config};

use build::BuildConfig;
use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use crate::graph::FilenamePattern;
use crate::pipeline::Dispatcher;
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing pagekit.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// CLI arguments reference
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Preview server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content).with_context(|| format!("in `{}`", path.display()))
    }

    /// Load, apply CLI overrides, normalize paths and validate.
    ///
    /// A missing config file is not an error; every field has a default.
    pub fn load(cli: &'static Cli) -> Result<Self> {
        let base = cli.root.as_deref().unwrap_or(Path::new("./"));
        let base = PathBuf::from(shellexpand::tilde(&base.to_string_lossy()).into_owned());
        let config_path = base.join(&cli.config);

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };

        // `[build] root` in the file is relative to the file's directory; `--root` wins.
        let root = match &config.build.root {
            Some(root) if cli.root.is_none() => base.join(root),
            _ => base,
        };
        config.set_root(&root);
        config.update_with_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Staging directory written during a build, swapped into `output` on success.
    pub fn staging_dir(&self) -> PathBuf {
        sibling_with_suffix(&self.build.output, "staging")
    }

    /// Where the previous output is parked while the staging directory is swapped in.
    pub fn retired_dir(&self) -> PathBuf {
        sibling_with_suffix(&self.build.output, "old")
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &'static Cli) {
        self.cli = Some(cli);

        Self::update_option(&mut self.build.pages, cli.pages.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());

        if let Some(args) = cli.build_args() {
            Self::update_option(&mut self.build.clean, args.clean.as_ref());
            Self::update_option(&mut self.build.css_mode, args.css_mode.as_ref());
        }

        if let Commands::Serve {
            interface,
            port,
            watch,
            ..
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
        }

        let root = self.get_root().to_owned();
        self.update_path_with_root(&root, &cli.config);
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Make all source paths absolute and strip leading dots from extensions.
    fn update_path_with_root(&mut self, root: &Path, config_file: &Path) {
        let root = Self::normalize_path(root);
        self.set_root(&root);
        self.config_path = Self::normalize_path(&root.join(config_file));

        let build = &mut self.build;
        build.pages = Self::normalize_path(&root.join(&build.pages));
        build.entries = Self::normalize_path(&root.join(&build.entries));
        build.output = Self::normalize_path(&root.join(&build.output));
        for dir in build.alias.values_mut() {
            *dir = Self::normalize_path(&root.join(&*dir));
        }
        for copy in &mut build.copy {
            copy.from = Self::normalize_path(&root.join(&copy.from));
        }

        build.template_ext = build.template_ext.trim_start_matches('.').to_owned();
        build.script_ext = build.script_ext.trim_start_matches('.').to_owned();
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration before any build work starts.
    pub fn validate(&self) -> Result<()> {
        let build = &self.build;

        for (field, ext) in [
            ("[build.template_ext]", &build.template_ext),
            ("[build.script_ext]", &build.script_ext),
        ] {
            if ext.is_empty() {
                bail!(ConfigError::Validation(format!("{field} must not be empty")));
            }
        }

        for (field, pattern) in [
            ("[build.html_filename]", &build.html_filename),
            ("[build.script_filename]", &build.script_filename),
            ("[build.css_filename]", &build.css_filename),
        ] {
            FilenamePattern::parse(pattern)
                .map_err(|reason| ConfigError::Validation(format!("{field} {reason}")))?;
        }

        if build.shared_css_name.is_empty() || build.shared_css_name.contains(['/', '\\']) {
            bail!(ConfigError::Validation(
                "[build.shared_css_name] must be a plain file name".into()
            ));
        }

        for alias in build.alias.keys() {
            if alias.is_empty() || alias.ends_with('/') {
                bail!(ConfigError::Validation(format!(
                    "[build.alias] key `{alias}` must be non-empty and not end with `/`"
                )));
            }
        }

        for copy in &build.copy {
            if !is_plain_relative(&copy.to) {
                bail!(ConfigError::Validation(format!(
                    "[build.copy] destination `{}` must stay inside the output directory",
                    copy.to.display()
                )));
            }
        }

        let output = &build.output;
        if build.pages.starts_with(output) || build.entries.starts_with(output) {
            bail!(ConfigError::Validation(
                "[build.output] must not contain the page or entry directories".into()
            ));
        }

        Dispatcher::from_config(&build.rules)?;

        for (stage, command) in &build.stages {
            Self::check_command_installed(&format!("[build.stages.{stage}]"), command)?;
        }

        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::Validation(format!(
                "{field} must have at least one element"
            )));
        };

        if let Err(err) = which::which(cmd) {
            bail!(ConfigError::Validation(format!(
                "{field} `{cmd}` not found ({err}). Please install it first."
            )));
        }

        Ok(())
    }
}

/// `/site/dist` → `/site/dist.<suffix>`
fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Relative and free of `..`, so joining it onto the output root stays inside it.
pub(crate) fn is_plain_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn leak_cli(args: &[&str]) -> &'static Cli {
        Box::leak(Box::new(Cli::try_parse_from(args).unwrap()))
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result = SiteConfig::from_str("[build\npages = 1");
        assert!(result.is_err());
        assert!(result.unwrap_err().downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_unknown_top_level_field_rejection() {
        let result = SiteConfig::from_str("[deploy]\nprovider = \"github\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_get_root_default() {
        let config = SiteConfig::default();
        assert_eq!(config.get_root(), Path::new("./"));
    }

    #[test]
    fn test_staging_and_retired_dirs() {
        let mut config = SiteConfig::default();
        config.build.output = PathBuf::from("/site/dist");
        assert_eq!(config.staging_dir(), PathBuf::from("/site/dist.staging"));
        assert_eq!(config.retired_dir(), PathBuf::from("/site/dist.old"));
    }

    #[test]
    fn test_update_with_cli_overrides_and_normalizes() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().to_str().unwrap();
        let cli = leak_cli(&[
            "pagekit", "--root", root, "--output", "public", "build", "--clean", "false",
            "--css-mode", "per-page",
        ]);

        let mut config = SiteConfig::from_str("[build]\ntemplate_ext = \".ejs\"").unwrap();
        config.set_root(dir.path());
        config.update_with_cli(cli);

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.build.output, root.join("public"));
        assert_eq!(config.build.pages, root.join("src/views/pages"));
        assert_eq!(config.build.alias["@scss"], root.join("src/scss"));
        assert_eq!(config.build.template_ext, "ejs");
        assert!(!config.build.clean);
        assert_eq!(config.build.css_mode, CssMode::PerPage);
        assert_eq!(config.config_path, root.join("pagekit.toml"));
    }

    #[test]
    fn test_update_with_cli_serve_options() {
        let cli = leak_cli(&["pagekit", "serve", "--port", "9000", "--watch", "false"]);
        let mut config = SiteConfig::default();
        config.update_with_cli(cli);

        assert_eq!(config.serve.port, 9000);
        assert!(!config.serve.watch);
        assert_eq!(config.serve.interface, "127.0.0.1");
    }

    #[test]
    fn test_validate_defaults() {
        assert!(SiteConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_pattern_without_name() {
        let mut config = SiteConfig::default();
        config.build.html_filename = "index.html".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("[build.html_filename]"));
    }

    #[test]
    fn test_validate_rejects_escaping_copy_destination() {
        let mut config = SiteConfig::default();
        config.build.copy = vec![CopyConfig::new("src/imgs", "../imgs")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_rule_regex() {
        let mut config = SiteConfig::default();
        config.build.rules = vec![RuleConfig::new("broken", r"\.(ejs$", &[])];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_stage_command() {
        let mut config = SiteConfig::default();
        config.build.stages.insert("sass".into(), vec![]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("[build.stages.sass]"));
    }

    #[test]
    fn test_is_plain_relative() {
        assert!(is_plain_relative(Path::new("static/imgs")));
        assert!(is_plain_relative(Path::new("./static")));
        assert!(!is_plain_relative(Path::new("../imgs")));
        assert!(!is_plain_relative(Path::new("/abs")));
        assert!(!is_plain_relative(Path::new("")));
    }
}
