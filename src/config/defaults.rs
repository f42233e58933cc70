//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::{collections::BTreeMap, path::PathBuf};

    use super::super::build::{CopyConfig, CssMode, RuleConfig};

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn pages() -> PathBuf {
        "src/views/pages".into()
    }

    pub fn entries() -> PathBuf {
        "src/_entries".into()
    }

    pub fn output() -> PathBuf {
        "dist".into()
    }

    pub fn template_ext() -> String {
        "ejs".into()
    }

    pub fn script_ext() -> String {
        "js".into()
    }

    pub fn html_filename() -> String {
        "[name].html".into()
    }

    pub fn script_filename() -> String {
        "static/js/[name].bundle.js".into()
    }

    pub fn css_filename() -> String {
        "static/css/[name].bundle.css".into()
    }

    pub fn css_mode() -> CssMode {
        CssMode::default()
    }

    pub fn shared_css_name() -> String {
        "main".into()
    }

    pub fn alias() -> BTreeMap<String, PathBuf> {
        BTreeMap::from([
            ("@scss".into(), "src/scss".into()),
            ("@js".into(), "src/js".into()),
        ])
    }

    /// Rule order matters: the first matching rule wins.
    pub fn rules() -> Vec<RuleConfig> {
        vec![
            RuleConfig::new("template", r"(?i)\.ejs$", &["ejs", "html"]),
            RuleConfig::new(
                "style",
                r"\.(sa|sc|c)ss$",
                &["sass", "postcss", "css", "extract"],
            ),
            RuleConfig::new("script", r"\.m?js$", &["transpile"]),
            RuleConfig::new("image", r"(?i)\.(png|jpe?g|gif|svg|webp|ico)$", &["copy"]),
        ]
    }

    pub fn copy() -> Vec<CopyConfig> {
        vec![
            CopyConfig::new("src/imgs", "static/imgs"),
            CopyConfig::new("src/js/backend", "static/js/backend"),
        ]
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        5277
    }
}
