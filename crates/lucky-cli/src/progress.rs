//! `indicatif`-backed `ProgressReporter` so the core never depends on a UI
//! crate directly (§4.8).

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use lucky_core::pool::ProgressReporter;

pub struct BarReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: &str, total_items: Option<usize>) {
        let pb = ProgressBar::new(total_items.unwrap_or(0) as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg:20} [{bar:40.cyan/blue}] {pos}/{len}")
                .expect("valid progress template")
                .progress_chars("=> "),
        );
        pb.set_message(stage.to_string());
        *self.bar.lock().expect("progress bar poisoned") = Some(pb);
    }

    fn advance(&self, items_done: usize) {
        if let Some(pb) = self.bar.lock().expect("progress bar poisoned").as_ref() {
            pb.set_position(items_done as u64);
        }
    }

    fn finish_stage(&self) {
        if let Some(pb) = self.bar.lock().expect("progress bar poisoned").take() {
            pb.finish_and_clear();
        }
    }
}
