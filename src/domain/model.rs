use std::path::{Path, PathBuf};

use super::AppError;

/// One submitted download. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub open_folder_on_completion: bool,
}

/// State owned by the presentation layer across runs.
#[derive(Debug, Clone)]
pub struct Session {
    pub output_dir: PathBuf,
    pub open_folder_on_completion: bool,
    pub busy: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            output_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            open_folder_on_completion: true,
            busy: false,
        }
    }
}

impl Session {
    /// Marks the session busy and snapshots a request, or returns `None`
    /// when a run is already in flight.
    pub fn begin(&mut self, url: &str) -> Option<DownloadRequest> {
        if self.busy {
            return None;
        }
        self.busy = true;
        Some(DownloadRequest {
            url: url.trim().to_string(),
            output_dir: self.output_dir.clone(),
            open_folder_on_completion: self.open_folder_on_completion,
        })
    }

    pub fn finish(&mut self) {
        self.busy = false;
    }
}

/// Messages flowing from the worker to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    Status(String),
    /// Percent complete, 0.0 to 100.0
    Progress(f32),
    Completed(PathBuf),
    Failed(AppError),
}

impl DownloadEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadEvent::Completed(_) | DownloadEvent::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Connecting,
    Downloading,
    CheckingCodec,
    Converting,
    Completed,
    Failed,
}

impl DownloadPhase {
    /// Status line shown on entering the phase.
    ///
    /// `None` where something else owns the line: yt-dlp's own progress
    /// while downloading, and the terminal event once the run ends.
    pub fn status_text(&self) -> Option<&'static str> {
        match self {
            DownloadPhase::Idle => Some("Ready."),
            DownloadPhase::Connecting => Some("Connecting to TikTok..."),
            DownloadPhase::CheckingCodec => Some("Checking video codec..."),
            DownloadPhase::Converting => Some("Converting... (this may take a while)"),
            DownloadPhase::Downloading | DownloadPhase::Completed | DownloadPhase::Failed => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeReason {
    /// Detected codec name, e.g. `hevc`
    Hevc(String),
    /// Extension of the downloaded file, possibly empty
    NotMp4(String),
}

impl TranscodeReason {
    pub fn status_text(&self) -> String {
        match self {
            TranscodeReason::Hevc(codec) => {
                format!("{} detected → Converting to MP4 H.264...", codec.to_uppercase())
            }
            TranscodeReason::NotMp4(_) => "Not an MP4 → Converting to MP4 H.264...".to_string(),
        }
    }
}

/// Decides whether a downloaded file must be re-encoded.
pub fn transcode_reason(codec: Option<&str>, path: &Path) -> Option<TranscodeReason> {
    if let Some(codec) = codec {
        let lower = codec.to_lowercase();
        if lower.contains("hevc") || lower.contains("h265") {
            return Some(TranscodeReason::Hevc(codec.to_string()));
        }
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    if !ext.eq_ignore_ascii_case("mp4") {
        return Some(TranscodeReason::NotMp4(ext));
    }

    None
}
