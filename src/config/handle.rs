//! Global config with atomic reload support.
//!
//! Uses `arc-swap` for lock-free reads and atomic config replacement, so the
//! preview server and the watcher always see one consistent `SiteConfig`
//! while `pagekit.toml` is edited.
//!
//! ```ignore
//! use crate::config::cfg;
//!
//! let c = cfg();
//! build_site(&c)?;
//! ```

use super::SiteConfig;
use arc_swap::ArcSwap;
use std::{
    fs,
    sync::{Arc, LazyLock},
};

/// Global config storage, replaced with the loaded config in main.
pub static CONFIG: LazyLock<ArcSwap<SiteConfig>> =
    LazyLock::new(|| ArcSwap::from_pointee(SiteConfig::default()));

/// Hash of the config file content behind the current [`CONFIG`].
static CONFIG_HASH: LazyLock<ArcSwap<Option<blake3::Hash>>> =
    LazyLock::new(|| ArcSwap::from_pointee(None));

/// Get current config as `Arc<SiteConfig>`. Lock-free.
#[inline]
pub fn cfg() -> Arc<SiteConfig> {
    CONFIG.load_full()
}

/// Re-read `pagekit.toml` and swap it in if its content changed.
///
/// Returns `Ok(false)` when the file is byte-identical to the last load. On a
/// parse or validation error the current config stays in place.
pub fn reload_config() -> anyhow::Result<bool> {
    let c = cfg();
    let Some(cli) = c.cli else {
        anyhow::bail!("config was not loaded from the command line");
    };

    let hash = fs::read(&c.config_path).ok().map(|bytes| blake3::hash(&bytes));
    if **CONFIG_HASH.load() == hash {
        return Ok(false);
    }

    let new_config = SiteConfig::load(cli)?;
    CONFIG.store(Arc::new(new_config));
    CONFIG_HASH.store(Arc::new(hash));

    Ok(true)
}

/// Initialize global config (called once at startup).
pub fn init_config(config: SiteConfig) {
    let hash = fs::read(&config.config_path)
        .ok()
        .map(|bytes| blake3::hash(&bytes));
    CONFIG_HASH.store(Arc::new(hash));
    CONFIG.store(Arc::new(config));
}
