pub mod ffmpeg;
pub mod ffprobe;
pub mod locator;
pub mod models;
pub mod ytdlp;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{ChildStderr, Command};
use std::thread::JoinHandle;

use crate::application::events::EventSender;
use crate::domain::AppError;

pub use ffmpeg::FfMpeg;
pub use ffprobe::FfProbe;
pub use locator::ToolLocator;
pub use models::ToolConfig;
pub use ytdlp::YtDlp;

/// Resolves a URL to a local media file
pub trait MediaDownloader {
    fn download(&self, url: &str, output_dir: &Path, events: &EventSender)
        -> Result<PathBuf, AppError>;
}

/// Reads the codec of the first video stream. `None` means unknown.
pub trait CodecProbe {
    fn video_codec(&self, path: &Path) -> Option<String>;
}

/// Re-encodes a file to H.264/AAC MP4, returning the new file
pub trait Transcoder {
    fn transcode(&self, source: &Path) -> Result<PathBuf, AppError>;
}

/// Build a command that does not flash a console window on Windows
pub(crate) fn command(program: &Path) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(program);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
    }
    cmd
}

/// Drain a child's stderr on a helper thread so a full pipe never stalls it
pub(crate) fn collect_stderr(mut stderr: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = stderr.read_to_end(&mut buf) {
            tracing::debug!("Failed to read stderr: {}", e);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}
