//! File → processing chain routing.
//!
//! Rules are an ordered list and the first match wins, so a specific rule
//! placed before a broader one always takes precedence:
//!
//! | # | Test              | Chain      |
//! |---|-------------------|------------|
//! | 1 | `\.ejs$`          | `template` |
//! | 2 | `\.(sa\|sc\|c)ss$`| `style`    |
//! | 3 | `\.m?js$`         | `script`   |
//!
//! A file no rule matches is passed through unchanged.

use crate::config::{ConfigError, RuleConfig};
use regex::Regex;
use serde::Serialize;
use std::path::Path;

/// Named, ordered stages applied to one matched file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chain {
    pub name: String,
    pub stages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    test: Regex,
    chain: Chain,
}

impl Rule {
    pub fn new(test: Regex, chain: Chain) -> Self {
        Self { test, chain }
    }

    fn matches(&self, path: &str) -> bool {
        self.test.is_match(path)
    }
}

/// Outcome of routing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch<'a> {
    Chain(&'a Chain),
    /// No rule matched; copy the file as-is.
    PassThrough,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    rules: Vec<Rule>,
}

impl Dispatcher {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Compile `[[build.rules]]`, keeping their order.
    pub fn from_config(rules: &[RuleConfig]) -> Result<Self, ConfigError> {
        rules
            .iter()
            .map(|rule| {
                let test = Regex::new(&rule.test).map_err(|err| {
                    ConfigError::Validation(format!(
                        "[build.rules] `{}` has an invalid test: {err}",
                        rule.name
                    ))
                })?;
                Ok(Rule::new(
                    test,
                    Chain {
                        name: rule.name.clone(),
                        stages: rule.stages.clone(),
                    },
                ))
            })
            .collect::<Result<_, _>>()
            .map(Self::new)
    }

    /// Chain of the first rule whose test matches the `/`-separated path.
    pub fn select(&self, path: &Path) -> Dispatch<'_> {
        let path = path.to_string_lossy().replace('\\', "/");
        self.rules
            .iter()
            .find(|rule| rule.matches(&path))
            .map_or(Dispatch::PassThrough, |rule| Dispatch::Chain(&rule.chain))
    }

    pub fn rules(&self) -> impl Iterator<Item = &Chain> {
        self.rules.iter().map(|r| &r.chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    fn chain_name<'a>(dispatch: Dispatch<'a>) -> Option<&'a str> {
        match dispatch {
            Dispatch::Chain(chain) => Some(&chain.name),
            Dispatch::PassThrough => None,
        }
    }

    #[test]
    fn test_first_match_wins() {
        let dispatcher = Dispatcher::from_config(&[
            RuleConfig::new("templateChain", r"\.ejs$", &["ejs"]),
            // Broader rule that would also match `foo.ejs`
            RuleConfig::new("scriptChain", r"\.(js|ejs)$", &["transpile"]),
        ])
        .unwrap();

        assert_eq!(chain_name(dispatcher.select(Path::new("foo.ejs"))), Some("templateChain"));
        assert_eq!(chain_name(dispatcher.select(Path::new("foo.js"))), Some("scriptChain"));
    }

    #[test]
    fn test_order_decides_overlap() {
        let dispatcher = Dispatcher::from_config(&[
            RuleConfig::new("any", r".*", &[]),
            RuleConfig::new("template", r"\.ejs$", &["ejs"]),
        ])
        .unwrap();
        assert_eq!(chain_name(dispatcher.select(Path::new("foo.ejs"))), Some("any"));
    }

    #[test]
    fn test_unmatched_passes_through() {
        let dispatcher = Dispatcher::from_config(&SiteConfig::default().build.rules).unwrap();
        assert_eq!(dispatcher.select(Path::new("robots.txt")), Dispatch::PassThrough);
        assert_eq!(dispatcher.select(Path::new("fonts/inter.woff2")), Dispatch::PassThrough);
    }

    #[test]
    fn test_default_rules() {
        let dispatcher = Dispatcher::from_config(&SiteConfig::default().build.rules).unwrap();
        let select = |p: &str| chain_name(dispatcher.select(Path::new(p)));

        assert_eq!(select("src/views/pages/home.ejs"), Some("template"));
        assert_eq!(select("src/views/pages/HOME.EJS"), Some("template"));
        assert_eq!(select("src/scss/main.scss"), Some("style"));
        assert_eq!(select("src/scss/reset.css"), Some("style"));
        assert_eq!(select("src/scss/legacy.sass"), Some("style"));
        assert_eq!(select("src/_entries/home.entry.js"), Some("script"));
        assert_eq!(select("src/js/util.mjs"), Some("script"));
        assert_eq!(select("src/imgs/logo.PNG"), Some("image"));
        assert_eq!(select("src/js/data.json"), None);
    }

    #[test]
    fn test_matches_full_path_with_forward_slashes() {
        let dispatcher = Dispatcher::from_config(&[RuleConfig::new(
            "backend",
            r"/js/backend/",
            &["copy"],
        )])
        .unwrap();
        assert_eq!(
            chain_name(dispatcher.select(Path::new("/site/src/js/backend/api.js"))),
            Some("backend")
        );
    }

    #[test]
    fn test_invalid_regex_names_rule() {
        let err = Dispatcher::from_config(&[RuleConfig::new("broken", "(", &[])]).unwrap_err();
        assert!(err.to_string().contains("`broken`"));
    }

    #[test]
    fn test_rules_keep_order() {
        let dispatcher = Dispatcher::from_config(&SiteConfig::default().build.rules).unwrap();
        let names: Vec<_> = dispatcher.rules().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["template", "style", "script", "image"]);
    }
}
