use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::thread::JoinHandle;

use crate::{
    application::events::EventSender,
    domain::{transcode_reason, AppError, DownloadPhase, DownloadRequest},
    tools::{
        CodecProbe, FfMpeg, FfProbe, MediaDownloader, ToolConfig, ToolLocator, Transcoder, YtDlp,
    },
};

const FFMPEG_HINT: &str = "FFmpeg is needed to guarantee a compatible MP4.\n\n\
    Put ffmpeg (and ffprobe) in the SAME folder as this application,\n\
    or install FFmpeg so it is on your PATH.";

const YTDLP_HINT: &str = "yt-dlp is needed to download videos.\n\n\
    Put yt-dlp in the SAME folder as this application,\n\
    or install it so it is on your PATH.";

/// Runs one download: fetch, inspect, convert when needed.
pub struct DownloadCoordinator {
    downloader: Box<dyn MediaDownloader>,
    probe: Box<dyn CodecProbe>,
    transcoder: Option<Box<dyn Transcoder>>,
}

impl DownloadCoordinator {
    pub fn new(
        downloader: Box<dyn MediaDownloader>,
        probe: Box<dyn CodecProbe>,
        transcoder: Option<Box<dyn Transcoder>>,
    ) -> Self {
        Self {
            downloader,
            probe,
            transcoder,
        }
    }

    /// Wire up the real tools found on this machine
    pub fn with_system_tools(config: &ToolConfig) -> Result<Self, AppError> {
        let locator = ToolLocator::new(config.fallback_dirs.clone());

        let ytdlp = locator
            .locate(&config.ytdlp_program)
            .ok_or_else(|| AppError::MissingTool {
                tool: "yt-dlp",
                hint: YTDLP_HINT.to_string(),
            })?;
        let ffprobe = locator.locate(&config.ffprobe_program);
        let ffmpeg = locator.locate(&config.ffmpeg_program);

        tracing::info!(
            "Tools: yt-dlp={} ffprobe={:?} ffmpeg={:?}",
            ytdlp.display(),
            ffprobe,
            ffmpeg
        );

        Ok(Self::new(
            Box::new(YtDlp::new(ytdlp, config.download.clone())),
            Box::new(FfProbe::new(ffprobe)),
            ffmpeg.map(|program| {
                Box::new(FfMpeg::new(program, config.transcode.clone())) as Box<dyn Transcoder>
            }),
        ))
    }

    /// Execute the run and emit exactly one terminal event.
    pub fn run(&self, request: &DownloadRequest, events: &EventSender) {
        finish(events, self.execute(request, events));
    }

    fn execute(
        &self,
        request: &DownloadRequest,
        events: &EventSender,
    ) -> Result<PathBuf, AppError> {
        enter(DownloadPhase::Connecting, events);

        enter(DownloadPhase::Downloading, events);
        let downloaded = self
            .downloader
            .download(&request.url, &request.output_dir, events)?;
        let name = downloaded
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        events.status(format!("Downloaded: {}", name));
        tracing::info!("Downloaded {}", downloaded.display());

        enter(DownloadPhase::CheckingCodec, events);
        let codec = self.probe.video_codec(&downloaded);

        let reason = match transcode_reason(codec.as_deref(), &downloaded) {
            Some(reason) => reason,
            None => return Ok(downloaded),
        };

        let transcoder = self.transcoder.as_ref().ok_or_else(|| AppError::MissingTool {
            tool: "ffmpeg",
            hint: FFMPEG_HINT.to_string(),
        })?;

        tracing::info!("Transcoding required: {:?}", reason);
        events.status(reason.status_text());
        enter(DownloadPhase::Converting, events);
        transcoder.transcode(&downloaded)
    }
}

fn enter(phase: DownloadPhase, events: &EventSender) {
    tracing::debug!("Phase: {:?}", phase);
    if let Some(text) = phase.status_text() {
        events.status(text);
    }
}

fn finish(events: &EventSender, result: Result<PathBuf, AppError>) {
    match result {
        Ok(path) => {
            tracing::info!("Phase: {:?}, final file {}", DownloadPhase::Completed, path.display());
            events.progress(100.0);
            events.completed(path);
        }
        Err(e) => {
            tracing::error!("Phase: {:?}, {}", DownloadPhase::Failed, e);
            events.failed(e);
        }
    }
}

/// Start the worker thread for one run.
pub fn spawn_download(
    config: ToolConfig,
    request: DownloadRequest,
    events: EventSender,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("download-worker".to_string())
        .spawn(move || {
            tracing::info!("Run started for {}", request.url);
            run_guarded(&events, |events| {
                match DownloadCoordinator::with_system_tools(&config) {
                    Ok(coordinator) => coordinator.run(&request, events),
                    Err(e) => finish(events, Err(e)),
                }
            });
        })
}

/// Run `body` and turn a panic into the run's terminal `Worker` failure.
fn run_guarded<F>(events: &EventSender, body: F)
where
    F: FnOnce(&EventSender),
{
    // A panic never reaches finish, so report it here
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| body(events))) {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        finish(events, Err(AppError::Worker(detail)));
    }
}
