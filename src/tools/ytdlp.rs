use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use super::{collect_stderr, command, models::DownloadOptions, models::YtDlpProgress, MediaDownloader};
use crate::application::events::EventSender;
use crate::domain::AppError;
use crate::utils::{find_latest_file, format_eta, format_speed, tail_chars};

const PROGRESS_MARKER: &str = "[tkdl-progress]";
const FILE_MARKER: &str = "[tkdl-file]";
const STDERR_TAIL_CHARS: usize = 900;

/// Downloads through the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    options: DownloadOptions,
}

impl YtDlp {
    pub fn new(program: PathBuf, options: DownloadOptions) -> Self {
        Self { program, options }
    }

    /// `tiktok_<id>_<title>.<ext>` inside `output_dir`
    pub fn output_template(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!(
            "tiktok_%(id)s_%(title).{}B.%(ext)s",
            self.options.title_max_bytes
        ))
    }

    fn build_command(&self, url: &str, output_dir: &Path) -> Command {
        let mut cmd = command(&self.program);
        cmd.arg("--no-playlist")
            .args(["-f", &self.options.format])
            .arg("-o")
            .arg(self.output_template(output_dir))
            .args(["--retries", &self.options.retries.to_string()])
            .args([
                "--socket-timeout",
                &self.options.socket_timeout_secs.to_string(),
            ])
            .arg("--windows-filenames")
            .arg("--no-warnings")
            // --print implies --quiet, so progress has to be asked for
            .arg("--progress")
            .arg("--newline")
            .args(["--progress-template", &progress_template()])
            .args(["--print", &format!("after_move:{}%(filepath)s", FILE_MARKER)])
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

/// One JSON object per progress line; missing fields become `null`
fn progress_template() -> String {
    let numeric = [
        "downloaded_bytes",
        "total_bytes",
        "total_bytes_estimate",
        "speed",
        "eta",
    ]
    .iter()
    .map(|field| format!(r#","{0}":%(progress.{0}|null)s"#, field))
    .collect::<String>();

    format!(
        r#"download:{}{{"status":%(progress.status)j{}}}"#,
        PROGRESS_MARKER, numeric
    )
}

impl MediaDownloader for YtDlp {
    fn download(
        &self,
        url: &str,
        output_dir: &Path,
        events: &EventSender,
    ) -> Result<PathBuf, AppError> {
        let mut cmd = self.build_command(url, output_dir);
        tracing::debug!("Running {:?}", cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| AppError::Extraction(format!("could not start yt-dlp: {}", e)))?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, collect_stderr(stderr)),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AppError::Io("yt-dlp output pipes unavailable".to_string()));
            }
        };

        let mut reporter = ProgressReporter::default();
        let mut reported_path = None;
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    // Keep going to wait(); the exit status decides the outcome
                    tracing::warn!("Failed to read yt-dlp output: {}", e);
                    break;
                }
            }

            // Console output is not guaranteed to be UTF-8
            let line = String::from_utf8_lossy(&buf);
            match parse_line(&line) {
                Some(YtDlpLine::Progress(progress)) => {
                    if let Some(update) = reporter.update(&progress) {
                        if let Some(percent) = update.percent {
                            events.progress(percent);
                        }
                        events.status(update.status);
                    }
                }
                Some(YtDlpLine::File(path)) => reported_path = Some(path),
                None => tracing::trace!("yt-dlp: {}", line.trim_end()),
            }
        }

        // Drains the rest of stdout so the child never blocks on a full pipe
        let _ = std::io::copy(&mut reader, &mut std::io::sink());

        let status = child.wait()?;
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            return Err(extraction_error(&stderr, status));
        }

        resolve_downloaded_path(reported_path, output_dir)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum YtDlpLine {
    Progress(YtDlpProgress),
    File(PathBuf),
}

pub fn parse_line(line: &str) -> Option<YtDlpLine> {
    let line = line.trim_end();
    if let Some(idx) = line.find(PROGRESS_MARKER) {
        let json = &line[idx + PROGRESS_MARKER.len()..];
        return match serde_json::from_str(json) {
            Ok(progress) => Some(YtDlpLine::Progress(progress)),
            Err(e) => {
                tracing::debug!("Unparseable progress line {:?}: {}", line, e);
                None
            }
        };
    }

    line.strip_prefix(FILE_MARKER)
        .filter(|path| !path.is_empty() && *path != "NA")
        .map(|path| YtDlpLine::File(PathBuf::from(path)))
}

/// Percent of `total` already downloaded, clamped to [0, 100]
pub fn percent_complete(downloaded: f64, total: f64) -> f32 {
    if total.is_nan() || total <= 0.0 {
        return 0.0;
    }
    ((downloaded * 100.0) / total).clamp(0.0, 100.0) as f32
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub percent: Option<f32>,
    pub status: String,
}

/// Turns raw progress into UI updates. The percent never goes backwards
/// within a run, even when yt-dlp starts counting again for a new fragment.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    last_percent: f32,
}

impl ProgressReporter {
    pub fn update(&mut self, progress: &YtDlpProgress) -> Option<ProgressUpdate> {
        match progress.status.as_str() {
            "downloading" => {
                let total = progress
                    .total_bytes
                    .or(progress.total_bytes_estimate)
                    .filter(|t| *t > 0.0);
                let percent = total.map(|total| {
                    let raw = percent_complete(progress.downloaded_bytes.unwrap_or(0.0), total);
                    self.last_percent = self.last_percent.max(raw);
                    self.last_percent
                });

                let mut status = format!("Downloading... {:.1}%", self.last_percent);
                if let Some(speed) = progress.speed.filter(|s| *s > 0.0) {
                    status.push_str(&format!(" | Speed: {}", format_speed(speed)));
                }
                if let Some(eta) = progress.eta.filter(|e| *e >= 0.0) {
                    status.push_str(&format!(" | ETA: {}", format_eta(eta as u64)));
                }

                Some(ProgressUpdate { percent, status })
            }
            "finished" => Some(ProgressUpdate {
                percent: None,
                status: "Download finished. Preparing...".to_string(),
            }),
            _ => None,
        }
    }
}

fn extraction_error(stderr: &str, status: ExitStatus) -> AppError {
    let errors = stderr
        .lines()
        .filter(|line| line.starts_with("ERROR:"))
        .collect::<Vec<_>>()
        .join("\n");

    let detail = if !errors.is_empty() {
        errors
    } else if !stderr.trim().is_empty() {
        tail_chars(stderr.trim_end(), STDERR_TAIL_CHARS).to_string()
    } else {
        format!("yt-dlp exited with {}", status)
    };

    tracing::error!("yt-dlp failed: {}", detail);
    AppError::Extraction(detail)
}

fn resolve_downloaded_path(
    reported: Option<PathBuf>,
    output_dir: &Path,
) -> Result<PathBuf, AppError> {
    if let Some(path) = reported.filter(|p| p.exists()) {
        return Ok(path);
    }

    tracing::warn!(
        "yt-dlp did not report an existing file, using newest file in {}",
        output_dir.display()
    );
    find_latest_file(output_dir).ok_or(AppError::OutputNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::event_channel;
    use crate::domain::DownloadEvent;

    fn progress(status: &str, downloaded: f64, total: Option<f64>) -> YtDlpProgress {
        YtDlpProgress {
            status: status.to_string(),
            downloaded_bytes: Some(downloaded),
            total_bytes: total,
            total_bytes_estimate: None,
            speed: None,
            eta: None,
        }
    }

    #[test]
    fn test_percent_complete_bounds() {
        assert_eq!(percent_complete(0.0, 100.0), 0.0);
        assert_eq!(percent_complete(50.0, 200.0), 25.0);
        assert_eq!(percent_complete(100.0, 100.0), 100.0);
        assert_eq!(percent_complete(150.0, 100.0), 100.0);
        assert_eq!(percent_complete(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_percent_is_monotonic() {
        let mut reporter = ProgressReporter::default();
        let total = 1000.0;
        let mut last = 0.0;
        for downloaded in [0.0, 100.0, 400.0, 50.0, 700.0, 1000.0] {
            let update = reporter
                .update(&progress("downloading", downloaded, Some(total)))
                .unwrap();
            let percent = update.percent.unwrap();
            assert!((0.0..=100.0).contains(&percent));
            assert!(percent >= last);
            last = percent;
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn test_status_line() {
        let mut reporter = ProgressReporter::default();
        let update = reporter
            .update(&YtDlpProgress {
                status: "downloading".to_string(),
                downloaded_bytes: Some(420.0),
                total_bytes: None,
                total_bytes_estimate: Some(1000.0),
                speed: Some(1.5 * 1024.0 * 1024.0),
                eta: Some(12.0),
            })
            .unwrap();
        assert_eq!(update.percent, Some(42.0));
        assert_eq!(
            update.status,
            "Downloading... 42.0% | Speed: 1.50 MB/s | ETA: 0:12"
        );
    }

    #[test]
    fn test_unknown_total_has_no_percent() {
        let mut reporter = ProgressReporter::default();
        let update = reporter
            .update(&progress("downloading", 500.0, None))
            .unwrap();
        assert_eq!(update.percent, None);
        assert_eq!(update.status, "Downloading... 0.0%");
    }

    #[test]
    fn test_finished_and_other_statuses() {
        let mut reporter = ProgressReporter::default();
        let update = reporter.update(&progress("finished", 10.0, Some(10.0))).unwrap();
        assert_eq!(update.percent, None);
        assert_eq!(update.status, "Download finished. Preparing...");
        assert_eq!(reporter.update(&progress("error", 0.0, None)), None);
    }

    #[test]
    fn test_parse_progress_line() {
        let line = r#"[tkdl-progress]{"status":"downloading","downloaded_bytes":1024,"total_bytes":null,"total_bytes_estimate":4096.5,"speed":null,"eta":3}"#;
        match parse_line(line) {
            Some(YtDlpLine::Progress(p)) => {
                assert_eq!(p.status, "downloading");
                assert_eq!(p.downloaded_bytes, Some(1024.0));
                assert_eq!(p.total_bytes, None);
                assert_eq!(p.total_bytes_estimate, Some(4096.5));
                assert_eq!(p.eta, Some(3.0));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_other_lines() {
        assert_eq!(
            parse_line("[tkdl-file]/tmp/tiktok_1_x.mp4"),
            Some(YtDlpLine::File(PathBuf::from("/tmp/tiktok_1_x.mp4")))
        );
        assert_eq!(parse_line("[tkdl-file]NA"), None);
        assert_eq!(parse_line("[tkdl-progress]{broken"), None);
        assert_eq!(parse_line("[TikTok] Extracting URL"), None);
    }

    #[test]
    fn test_progress_template_shape() {
        let template = progress_template();
        assert!(template.starts_with("download:[tkdl-progress]{\"status\":%(progress.status)j"));
        assert!(template.contains(r#""eta":%(progress.eta|null)s"#));
        assert!(template.ends_with('}'));
    }

    #[test]
    fn test_output_template() {
        let ytdlp = YtDlp::new(PathBuf::from("yt-dlp"), DownloadOptions::default());
        assert_eq!(
            ytdlp.output_template(Path::new("/videos")),
            PathBuf::from("/videos/tiktok_%(id)s_%(title).120B.%(ext)s")
        );
    }

    #[test]
    fn test_extraction_error_prefers_error_lines() {
        let stderr = "WARNING: slow\nERROR: [TikTok] 1: Unable to extract\n";
        match extraction_error(stderr, exit_status(1)) {
            AppError::Extraction(msg) => assert_eq!(msg, "ERROR: [TikTok] 1: Unable to extract"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[cfg(unix)]
    fn exit_status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    fn exit_status(code: i32) -> ExitStatus {
        use std::os::windows::process::ExitStatusExt;
        ExitStatus::from_raw(code as u32)
    }

    #[test]
    fn test_resolve_prefers_reported_path() {
        let dir = tempfile::tempdir().unwrap();
        let reported = dir.path().join("a.mp4");
        std::fs::write(&reported, b"x").unwrap();
        assert_eq!(
            resolve_downloaded_path(Some(reported.clone()), dir.path()).unwrap(),
            reported
        );
    }

    #[test]
    fn test_resolve_falls_back_to_newest_file() {
        let dir = tempfile::tempdir().unwrap();
        let actual = dir.path().join("tiktok_1_real.webm");
        std::fs::write(&actual, b"x").unwrap();
        assert_eq!(
            resolve_downloaded_path(Some(dir.path().join("missing.mp4")), dir.path()).unwrap(),
            actual
        );
    }

    #[test]
    fn test_resolve_fails_on_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_downloaded_path(None, dir.path()),
            Err(AppError::OutputNotFound)
        );
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::tools::test_support::write_script;

        #[test]
        fn test_download_reports_progress_and_path() {
            let tools = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let file = out.path().join("tiktok_123_clip.mp4");
            let script = write_script(
                tools.path(),
                "yt-dlp",
                &format!(
                    r#"echo '[TikTok] Extracting URL'
echo '[tkdl-progress]{{"status":"downloading","downloaded_bytes":50,"total_bytes":100,"total_bytes_estimate":null,"speed":2048,"eta":5}}'
echo '[tkdl-progress]{{"status":"finished","downloaded_bytes":100,"total_bytes":100,"total_bytes_estimate":null,"speed":null,"eta":null}}'
printf 'data' > '{0}'
echo '[tkdl-file]{0}'"#,
                    file.display()
                ),
            );

            let (tx, mut rx) = event_channel();
            let ytdlp = YtDlp::new(script, DownloadOptions::default());
            let path = ytdlp
                .download("https://www.tiktok.com/@u/video/123", out.path(), &tx)
                .unwrap();
            assert_eq!(path, file);

            assert_eq!(
                rx.drain(),
                vec![
                    DownloadEvent::Progress(50.0),
                    DownloadEvent::Status(
                        "Downloading... 50.0% | Speed: 2.0 KB/s | ETA: 0:05".to_string()
                    ),
                    DownloadEvent::Status("Download finished. Preparing...".to_string()),
                ]
            );
        }

        #[test]
        fn test_download_survives_non_utf8_output() {
            let tools = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let file = out.path().join("tiktok_7_cafe.mp4");
            let script = write_script(
                tools.path(),
                "yt-dlp",
                &format!(
                    r#"printf '[download] Destination: caf\351.mp4\n'
printf 'data' > '{0}'
echo '[tkdl-file]{0}'"#,
                    file.display()
                ),
            );

            let (tx, _rx) = event_channel();
            let ytdlp = YtDlp::new(script, DownloadOptions::default());
            let path = ytdlp
                .download("https://www.tiktok.com/@u/video/7", out.path(), &tx)
                .unwrap();
            assert_eq!(path, file);
            assert_eq!(std::fs::read(&file).unwrap(), b"data");
        }

        #[test]
        fn test_download_passes_options() {
            let tools = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let args_file = tools.path().join("args.txt");
            let script = write_script(
                tools.path(),
                "yt-dlp",
                &format!(r#"printf '%s\n' "$@" > '{}'"#, args_file.display()),
            );

            let (tx, _rx) = event_channel();
            let ytdlp = YtDlp::new(script, DownloadOptions::default());
            let result = ytdlp.download("https://vm.tiktok.com/abc/", out.path(), &tx);
            assert_eq!(result, Err(AppError::OutputNotFound));

            let args = std::fs::read_to_string(&args_file).unwrap();
            let args: Vec<&str> = args.lines().collect();
            let has_pair = |flag: &str, value: &str| {
                args.windows(2).any(|w| w[0] == flag && w[1] == value)
            };
            assert!(args.contains(&"--no-playlist"));
            assert!(args.contains(&"--windows-filenames"));
            assert!(has_pair("-f", "best[ext=mp4]/best"));
            assert!(has_pair("--retries", "5"));
            assert!(has_pair("--socket-timeout", "30"));
            assert!(has_pair("--print", "after_move:[tkdl-file]%(filepath)s"));
            assert_eq!(args.last(), Some(&"https://vm.tiktok.com/abc/"));
        }

        #[test]
        fn test_download_failure_is_extraction_error() {
            let tools = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let script = write_script(
                tools.path(),
                "yt-dlp",
                "echo 'ERROR: [TikTok] 42: Video unavailable' >&2; exit 1",
            );

            let (tx, _rx) = event_channel();
            let ytdlp = YtDlp::new(script, DownloadOptions::default());
            let err = ytdlp
                .download("https://www.tiktok.com/@u/video/42", out.path(), &tx)
                .unwrap_err();
            assert_eq!(
                err,
                AppError::Extraction("ERROR: [TikTok] 42: Video unavailable".to_string())
            );
        }
    }
}
