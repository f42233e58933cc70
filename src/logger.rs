//! Terminal logging with colored prefixes and per-target progress bars.
//!
//! ```ignore
//! log!("build"; "{} pages", count);
//!
//! let progress = ProgressBars::new(&[("pages", 12), ("assets", 40)]);
//! progress.inc_by_name("pages");
//! progress.finish();
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{Write, stdout},
    sync::{
        Mutex, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Cached terminal width (fetched once on first use)
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Rows currently reserved by live progress bars, so `log` can print above them.
static BAR_ROWS: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// Layout
// ============================================================================
//
// "[pages] [████░░░░] 3/12"
//  ^-----^ ^-------^ ^--^
//  prefix  bar       count

/// `[` + `]` + trailing space
const PREFIX_OVERHEAD: usize = 3;
/// " []" around the bar plus the space before the count
const BAR_OVERHEAD: usize = 4;
const MIN_BAR_WIDTH: usize = 10;
const MAX_BAR_WIDTH: usize = 40;

#[inline]
const fn prefix_len(module_len: usize) -> usize {
    module_len + PREFIX_OVERHEAD
}

fn terminal_width() -> usize {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120)) as usize
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix.
///
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

// ============================================================================
// Progress Bars
// ============================================================================

/// One progress bar per named build target kind, each on its own terminal row.
///
/// Safe to update from rayon workers; terminal writes are serialized.
pub struct ProgressBars {
    bars: Vec<ProgressBar>,
    lock: Mutex<()>,
}

struct ProgressBar {
    name: &'static str,
    prefix: ColoredString,
    total: usize,
    current: AtomicUsize,
    row: usize,
}

impl ProgressBars {
    /// Reserve one row per `(name, total)` pair and draw nothing until the first `inc`.
    pub fn new(modules: &[(&'static str, usize)]) -> Self {
        let mut out = stdout().lock();
        for _ in modules {
            writeln!(out).ok();
        }
        out.flush().ok();

        BAR_ROWS.store(modules.len(), Ordering::SeqCst);

        let bars = modules
            .iter()
            .enumerate()
            .map(|(row, &(name, total))| ProgressBar {
                name,
                prefix: colorize_prefix(name),
                total,
                current: AtomicUsize::new(0),
                row,
            })
            .collect();

        Self {
            bars,
            lock: Mutex::new(()),
        }
    }

    /// Like [`ProgressBars::new`] but drops empty rows.
    ///
    /// Returns `None` when there is at most one item in total.
    pub fn new_filtered(modules: &[(&'static str, usize)]) -> Option<Self> {
        let kept: Vec<_> = modules.iter().filter(|(_, n)| *n > 0).copied().collect();
        let total: usize = kept.iter().map(|(_, n)| n).sum();
        (total > 1).then(|| Self::new(&kept))
    }

    pub fn inc_by_name(&self, name: &str) {
        if let Some(bar) = self.bars.iter().find(|bar| bar.name == name) {
            let current = bar.current.fetch_add(1, Ordering::Relaxed) + 1;
            self.display(bar, current);
        }
    }

    fn display(&self, bar: &ProgressBar, current: usize) {
        let _guard = self.lock.lock().ok();

        let count = format!("{}/{}", current, bar.total);
        let overhead = prefix_len(bar.name.len()) + BAR_OVERHEAD + count.len();
        let width = terminal_width()
            .saturating_sub(overhead)
            .clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH);
        let filled = (current * width).checked_div(bar.total).unwrap_or(0).min(width);
        let drawn = "█".repeat(filled) + &"░".repeat(width - filled);

        let mut out = stdout().lock();
        #[allow(clippy::cast_possible_truncation)]
        let up = (self.bars.len() - bar.row) as u16;
        execute!(out, cursor::MoveUp(up), Clear(ClearType::CurrentLine)).ok();
        write!(out, "{} [{}] {}", bar.prefix, drawn, count).ok();
        execute!(out, cursor::MoveDown(up)).ok();
        write!(out, "\r").ok();
        out.flush().ok();
    }

    /// Clear the progress area. Idempotent.
    #[allow(clippy::cast_possible_truncation)]
    pub fn finish(&self) {
        if BAR_ROWS.swap(0, Ordering::SeqCst) == 0 {
            return;
        }
        let _guard = self.lock.lock().ok();

        let mut out = stdout().lock();
        let rows = self.bars.len() as u16;
        execute!(out, cursor::MoveUp(rows)).ok();
        for _ in &self.bars {
            execute!(out, Clear(ClearType::CurrentLine), cursor::MoveDown(1)).ok();
        }
        execute!(out, cursor::MoveUp(rows)).ok();
        out.flush().ok();
    }
}

impl Drop for ProgressBars {
    fn drop(&mut self) {
        self.finish();
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Print `[module] message`, truncated to the terminal width for single-line messages.
#[allow(clippy::cast_possible_truncation)]
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);
    let mut out = stdout().lock();

    let rows = BAR_ROWS.load(Ordering::SeqCst);
    if rows > 0 {
        execute!(out, cursor::MoveUp(rows as u16), Clear(ClearType::FromCursorDown)).ok();
    } else {
        execute!(out, Clear(ClearType::UntilNewLine)).ok();
    }

    let message = if message.contains('\n') {
        message
    } else {
        truncate_str(message, terminal_width().saturating_sub(prefix_len(module.len())))
    };
    writeln!(out, "{prefix} {message}").ok();

    for _ in 0..rows {
        writeln!(out).ok();
    }
    out.flush().ok();
}

fn colorize_prefix(module: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "serve" => prefix.bright_blue().bold(),
        "watch" => prefix.bright_green().bold(),
        "error" => prefix.bright_red().bold(),
        "warn" => prefix.bright_magenta().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Truncate to at most `max_len` bytes on a char boundary.
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_len() {
        // "[pages] "
        assert_eq!(prefix_len(5), 8);
        assert_eq!(prefix_len(0), 3);
    }

    #[test]
    fn test_truncate_str_fits() {
        assert_eq!(truncate_str("home", 10), "home");
        assert_eq!(truncate_str("home", 4), "home");
    }

    #[test]
    fn test_truncate_str_cuts() {
        assert_eq!(truncate_str("static/js/home.bundle.js", 9), "static/js");
        assert_eq!(truncate_str("home", 0), "");
    }

    #[test]
    fn test_truncate_str_char_boundary() {
        // "页面" is 6 bytes; byte 4 falls inside the second char
        assert_eq!(truncate_str("页面", 4), "页");
        assert_eq!(truncate_str("a页b", 3), "a");
    }

    #[test]
    fn test_new_filtered_skips_trivial_work() {
        assert!(ProgressBars::new_filtered(&[("pages", 1), ("assets", 0)]).is_none());
        assert!(ProgressBars::new_filtered(&[("pages", 0), ("assets", 0)]).is_none());
    }
}
