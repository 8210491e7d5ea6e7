use std::path::PathBuf;

use serde::Deserialize;

/// Configuration for the external tools
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub ytdlp_program: String,
    pub ffprobe_program: String,
    pub ffmpeg_program: String,
    pub download: DownloadOptions,
    pub transcode: TranscodeSettings,
    /// Searched, in order, after the system PATH
    pub fallback_dirs: Vec<PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        let mut fallback_dirs = Vec::new();
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.canonicalize().ok())
            .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        {
            fallback_dirs.push(dir);
        }
        if cfg!(debug_assertions) {
            fallback_dirs.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")));
        }

        Self {
            ytdlp_program: "yt-dlp".to_string(),
            ffprobe_program: "ffprobe".to_string(),
            ffmpeg_program: "ffmpeg".to_string(),
            download: DownloadOptions::default(),
            transcode: TranscodeSettings::default(),
            fallback_dirs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub format: String,
    pub retries: u32,
    pub socket_timeout_secs: u32,
    pub title_max_bytes: u32,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            format: "best[ext=mp4]/best".to_string(),
            retries: 5,
            socket_timeout_secs: 30,
            title_max_bytes: 120,
        }
    }
}

/// x264/AAC encoder settings
#[derive(Debug, Clone)]
pub struct TranscodeSettings {
    pub crf: u8,
    pub preset: String,
    pub audio_bitrate: String,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            crf: 18,
            preset: "slow".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

/// One progress line emitted by yt-dlp through our progress template
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct YtDlpProgress {
    pub status: String,
    #[serde(default)]
    pub downloaded_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes_estimate: Option<f64>,
    /// Bytes per second
    #[serde(default)]
    pub speed: Option<f64>,
    /// Seconds remaining
    #[serde(default)]
    pub eta: Option<f64>,
}
