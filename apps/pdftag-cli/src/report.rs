//! Machine-readable command results

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoReport {
    pub input: String,
    pub pages: usize,
    pub tagged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchReport {
    pub input: String,
    pub output: String,
    pub pages: usize,
    pub artifacts_wrapped: Option<usize>,
    pub bboxes_inserted: Option<usize>,
    /// Security handler revision, when the output is encrypted
    pub encryption_revision: Option<u8>,
}

impl PatchReport {
    pub fn summary(&self) -> String {
        let step = |count: Option<usize>| match count {
            Some(n) => n.to_string(),
            None => "skipped".to_string(),
        };
        let encryption = match self.encryption_revision {
            Some(revision) => format!("revision {}", revision),
            None => "none".to_string(),
        };
        format!(
            "{} -> {}\n  pages: {}\n  artifacts wrapped: {}\n  bounding boxes added: {}\n  encryption: {}",
            self.input,
            self.output,
            self.pages,
            step(self.artifacts_wrapped),
            step(self.bboxes_inserted),
            encryption
        )
    }
}
