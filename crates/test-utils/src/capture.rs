use std::sync::{Arc, Mutex};

use rewatch::output::{Label, OutputSink, SharedOutput};

/// Output sink that keeps every line in memory.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    lines: Arc<Mutex<Vec<(String, String)>>>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> SharedOutput {
        Arc::new(self.clone())
    }

    /// `(label, line)` pairs in arrival order; raw lines have an empty label.
    pub fn lines(&self) -> Vec<(String, String)> {
        self.lines.lock().unwrap().clone()
    }

    /// Lines pushed under exactly `label`.
    pub fn lines_for(&self, label: &str) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == label)
            .map(|(_, line)| line.clone())
            .collect()
    }

    pub fn count_for(&self, label: &str, line: &str) -> usize {
        self.lines_for(label).iter().filter(|l| *l == line).count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|(_, line)| line.contains(needle))
    }
}

impl OutputSink for CapturedOutput {
    fn push(&self, label: &Label, line: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((label.text().to_string(), line.to_string()));
    }

    fn push_raw(&self, line: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((String::new(), line.to_string()));
    }
}
