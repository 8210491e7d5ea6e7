use std::path::{Path, PathBuf};
use std::process::Stdio;

use super::{command, models::TranscodeSettings, Transcoder};
use crate::domain::AppError;
use crate::utils::tail_chars;

/// How much of ffmpeg's stderr ends up in the error dialog
const STDERR_TAIL_CHARS: usize = 900;

/// H.264/AAC re-encoding through `ffmpeg`
#[derive(Debug, Clone)]
pub struct FfMpeg {
    program: PathBuf,
    settings: TranscodeSettings,
}

impl FfMpeg {
    pub fn new(program: PathBuf, settings: TranscodeSettings) -> Self {
        Self { program, settings }
    }
}

/// `<stem>_MP4_H264.mp4` next to the source
pub fn converted_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    source.with_file_name(format!("{}_MP4_H264.mp4", stem))
}

impl Transcoder for FfMpeg {
    fn transcode(&self, source: &Path) -> Result<PathBuf, AppError> {
        let destination = converted_path(source);
        if destination.exists() {
            // -y overwrites anyway
            let _ = std::fs::remove_file(&destination);
        }

        let mut cmd = command(&self.program);
        cmd.arg("-y")
            .arg("-i")
            .arg(source)
            .args(["-c:v", "libx264"])
            .args(["-preset", &self.settings.preset])
            .args(["-crf", &self.settings.crf.to_string()])
            .args(["-c:a", "aac"])
            .args(["-b:a", &self.settings.audio_bitrate])
            .args(["-movflags", "+faststart"])
            .arg(&destination)
            .stdin(Stdio::null());

        tracing::debug!("Running {:?}", cmd);
        let output = cmd
            .output()
            .map_err(|e| AppError::Transcode(format!("could not start ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = tail_chars(stderr.trim_end(), STDERR_TAIL_CHARS);
            tracing::error!("ffmpeg exited with {}", output.status);
            return Err(AppError::Transcode(tail.to_string()));
        }

        tracing::info!("Converted {} -> {}", source.display(), destination.display());
        Ok(destination)
    }
}
