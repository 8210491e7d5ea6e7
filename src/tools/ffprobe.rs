use std::path::{Path, PathBuf};
use std::process::Stdio;

use super::{command, CodecProbe};

/// Codec inspection through `ffprobe`. Without a program every probe
/// answers "unknown".
#[derive(Debug, Clone)]
pub struct FfProbe {
    program: Option<PathBuf>,
}

impl FfProbe {
    pub fn new(program: Option<PathBuf>) -> Self {
        Self { program }
    }
}

impl CodecProbe for FfProbe {
    fn video_codec(&self, path: &Path) -> Option<String> {
        let program = self.program.as_ref()?;

        let output = command(program)
            .args(["-v", "error"])
            .args(["-select_streams", "v:0"])
            .args(["-show_entries", "stream=codec_name"])
            .args(["-of", "default=nw=1:nk=1"])
            .arg(path)
            .stdin(Stdio::null())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("ffprobe could not start: {}", e);
                return None;
            }
        };

        if !output.status.success() {
            tracing::warn!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }

        let codec = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if codec.is_empty() {
            None
        } else {
            tracing::info!("Video codec of {}: {}", path.display(), codec);
            Some(codec)
        }
    }
}
