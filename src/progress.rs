// Progress reporting: indicatif byte bars for the CLI, and a row-interval callback
// the router invokes so library users can report progress their own way.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs;
use std::sync::Arc;

#[derive(Clone)]
pub struct ProgressManager {
    multi: Option<Arc<MultiProgress>>,
}

impl ProgressManager {
    // If enabled=false, no bars are created.
    pub fn new(enabled: bool) -> Self {
        let multi = if enabled {
            Some(Arc::new(MultiProgress::new()))
        } else {
            None
        };
        Self { multi }
    }

    pub fn is_enabled(&self) -> bool {
        self.multi.is_some()
    }

    // Bar sized to the file, advanced by bytes read.
    pub fn new_file_bar(&self, path: &str, label: &str) -> Option<ProgressBar> {
        let mp = self.multi.as_ref()?;
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let bar = mp.add(ProgressBar::new(size));
        bar.set_style(progress_style());
        bar.set_prefix(label.to_string());
        Some(bar)
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:20} {bytes:>10}/{total_bytes:<10} [{bar:50}] {percent:>3}% {msg}",
    )
    .map(|style| style.progress_chars("█ "))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Calls `callback(rows)` every `every` records built (0 disables it).
pub struct RowProgress<'s> {
    every: u64,
    rows: u64,
    callback: Box<dyn FnMut(u64) + 's>,
}

impl<'s> RowProgress<'s> {
    pub fn new(every: u64, callback: impl FnMut(u64) + 's) -> Self {
        Self {
            every,
            rows: 0,
            callback: Box::new(callback),
        }
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn tick(&mut self) {
        self.rows += 1;
        if self.every > 0 && self.rows % self.every == 0 {
            (self.callback)(self.rows);
        }
    }
}
