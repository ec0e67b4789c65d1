use serde::{Deserialize, Serialize};

use crate::protocol::FileMeta;

/// Fixed chunk size for outgoing files
pub const CHUNK_SIZE: usize = 16 * 1024; // 16KB chunks

/// Progress of one transfer in whole percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Percent(u8);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const COMPLETE: Percent = Percent(100);

    /// floor(done * 100 / total), capped at 100; an empty total is complete.
    pub fn of(done: u64, total: u64) -> Self {
        if total == 0 {
            return Self::COMPLETE;
        }
        let value = (done as u128 * 100 / total as u128).min(100);
        Percent(value as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for Percent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Snapshot reported after each received chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkProgress {
    pub file_id: String,
    pub received_bytes: u64,
    pub total_bytes: u64,
    pub percent: Percent,
    /// True when this chunk opened the transfer slot
    pub started: bool,
}

/// A fully assembled inbound file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub file_id: String,
    pub meta: FileMeta,
    pub chunk_count: usize,
    pub data: Vec<u8>,
}

/// Coarse file category used for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Video,
    Audio,
    Pdf,
    Document,
    Spreadsheet,
    Presentation,
    Archive,
    Text,
    Code,
    Other,
}

impl FileKind {
    /// Classify by MIME type first, then by file name
    pub fn classify(mime_type: &str, file_name: &str) -> Self {
        let mime = mime_type.to_ascii_lowercase();
        let name = file_name.to_ascii_lowercase();
        let ends_with_any = |exts: &[&str]| exts.iter().any(|ext| name.ends_with(ext));

        if mime.starts_with("image/") {
            FileKind::Image
        } else if mime.starts_with("video/") {
            FileKind::Video
        } else if mime.starts_with("audio/") {
            FileKind::Audio
        } else if mime == "application/pdf" {
            FileKind::Pdf
        } else if mime.contains("word") || ends_with_any(&[".doc", ".docx"]) {
            FileKind::Document
        } else if mime.contains("excel") || ends_with_any(&[".xls", ".xlsx"]) {
            FileKind::Spreadsheet
        } else if mime.contains("powerpoint") || ends_with_any(&[".ppt", ".pptx"]) {
            FileKind::Presentation
        } else if ["zip", "rar", "tar"].iter().any(|k| mime.contains(k))
            || ends_with_any(&[".zip", ".rar", ".tar.gz"])
        {
            FileKind::Archive
        } else if mime.contains("text/") || name.ends_with(".txt") {
            FileKind::Text
        } else if ends_with_any(&[".json", ".xml", ".html", ".css", ".js"]) {
            FileKind::Code
        } else {
            FileKind::Other
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            FileKind::Image => "🖼️",
            FileKind::Video => "🎬",
            FileKind::Audio => "🎵",
            FileKind::Pdf => "📄",
            FileKind::Document | FileKind::Text => "📝",
            FileKind::Spreadsheet => "📊",
            FileKind::Presentation => "📽️",
            FileKind::Archive => "🗜️",
            FileKind::Code => "📋",
            FileKind::Other => "📎",
        }
    }

    /// Images get an inline preview hint
    pub fn is_previewable(self) -> bool {
        matches!(self, FileKind::Image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_floor_and_cap() {
        assert_eq!(Percent::of(0, 100).value(), 0);
        assert_eq!(Percent::of(16384, 40000).value(), 40);
        assert_eq!(Percent::of(39999, 40000).value(), 99);
        assert_eq!(Percent::of(40000, 40000).value(), 100);
        assert_eq!(Percent::of(50000, 40000).value(), 100);
        assert_eq!(Percent::of(0, 0), Percent::COMPLETE);
    }

    #[test]
    fn test_classify() {
        assert_eq!(FileKind::classify("image/png", "a.png"), FileKind::Image);
        assert_eq!(FileKind::classify("application/pdf", "a.pdf"), FileKind::Pdf);
        assert_eq!(FileKind::classify("", "report.docx"), FileKind::Document);
        assert_eq!(FileKind::classify("application/zip", "a.zip"), FileKind::Archive);
        assert_eq!(FileKind::classify("text/plain", "notes"), FileKind::Text);
        assert_eq!(FileKind::classify("application/octet-stream", "data.json"), FileKind::Code);
        assert_eq!(FileKind::classify("application/octet-stream", "blob.bin"), FileKind::Other);
        assert!(FileKind::Image.is_previewable());
        assert!(!FileKind::Pdf.is_previewable());
    }
}
