use std::path::{Path, PathBuf};
use std::io;
use std::process::{Command, ExitStatus};
use std::sync::LazyLock;
use std::thread::JoinHandle;

use regex::Regex;

use crate::domain::AppError;

static TIKTOK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://(www\.|vm\.|vt\.)?tiktok\.com/").expect("valid TikTok URL pattern")
});

/// Check that a string looks like a TikTok video link
pub fn is_tiktok_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && TIKTOK_URL.is_match(url)
}

/// Trimmed URL, or `InvalidUrl` when it is not a TikTok link
pub fn validate_url(url: &str) -> Result<&str, AppError> {
    if is_tiktok_url(url) {
        Ok(url.trim())
    } else {
        Err(AppError::InvalidUrl)
    }
}

/// Render a transfer rate given in bytes per second
pub fn format_speed(bytes_per_sec: f64) -> String {
    let kb = bytes_per_sec / 1024.0;
    if kb < 1024.0 {
        format!("{:.1} KB/s", kb)
    } else {
        format!("{:.2} MB/s", kb / 1024.0)
    }
}

/// Render a duration in seconds as `H:MM:SS`, or `M:SS` under an hour
pub fn format_eta(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds / 60) % 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Last `max_chars` characters of `text`, without splitting a character.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

/// Most recently modified regular file directly inside `dir`.
pub fn find_latest_file(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            Some((meta.modified().ok()?, entry.path()))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

/// Open a folder in the platform file manager. Failures are only logged.
pub fn open_folder(folder: &Path) {
    let opener = if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };

    let mut cmd = Command::new(opener);
    cmd.arg(folder);
    if let Err(e) = spawn_reaped(cmd) {
        tracing::warn!("Failed to open {}: {}", folder.display(), e);
    }
}

/// Spawn without waiting; a background thread collects the exit status.
fn spawn_reaped(mut cmd: Command) -> io::Result<JoinHandle<io::Result<ExitStatus>>> {
    let mut child = cmd.spawn()?;
    std::thread::Builder::new()
        .name("opener-reaper".to_string())
        .spawn(move || child.wait())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_valid_tiktok_urls() {
        assert!(is_tiktok_url("https://www.tiktok.com/@user/video/123"));
        assert!(is_tiktok_url("http://tiktok.com/@user/video/123"));
        assert!(is_tiktok_url("https://vm.tiktok.com/ZMabc/"));
        assert!(is_tiktok_url("https://vt.tiktok.com/ZSxyz/"));
        assert!(is_tiktok_url("HTTPS://WWW.TIKTOK.COM/@user/video/1"));
        assert!(is_tiktok_url("  https://www.tiktok.com/@user/video/1  "));
    }

    #[test]
    fn test_invalid_tiktok_urls() {
        assert!(!is_tiktok_url(""));
        assert!(!is_tiktok_url("   "));
        assert!(!is_tiktok_url("https://example.com/video"));
        assert!(!is_tiktok_url("ftp://www.tiktok.com/@user"));
        assert!(!is_tiktok_url("https://tiktok.com.evil.org/"));
        assert!(!is_tiktok_url("https://m.tiktok.com/v/1"));
        assert!(!is_tiktok_url("see https://www.tiktok.com/@user/video/1"));
        assert!(!is_tiktok_url("https://www.tiktok.com"));
    }

    #[test]
    fn test_validate_url() {
        assert_eq!(
            validate_url(" https://www.tiktok.com/@user/video/123 "),
            Ok("https://www.tiktok.com/@user/video/123")
        );
        assert_eq!(validate_url("https://example.com/video"), Err(AppError::InvalidUrl));
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(512.0 * 1024.0), "512.0 KB/s");
        assert_eq!(format_speed(1023.0 * 1024.0), "1023.0 KB/s");
        assert_eq!(format_speed(1024.0 * 1024.0), "1.00 MB/s");
        assert_eq!(format_speed(2.5 * 1024.0 * 1024.0), "2.50 MB/s");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(0), "0:00");
        assert_eq!(format_eta(75), "1:15");
        assert_eq!(format_eta(3599), "59:59");
        assert_eq!(format_eta(3600), "1:00:00");
        assert_eq!(format_eta(3725), "1:02:05");
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("hello", 10), "hello");
        assert_eq!(tail_chars("hello", 3), "llo");
        assert_eq!(tail_chars("añbñc", 3), "bñc");
        assert_eq!(tail_chars("abc", 0), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_spawned_opener_is_reaped() {
        let handle = spawn_reaped(Command::new("true")).unwrap();
        assert!(handle.join().unwrap().unwrap().success());
    }

    #[test]
    fn test_spawn_reaped_reports_missing_program() {
        assert!(spawn_reaped(Command::new("tkdl-test-missing-opener")).is_err());
    }

    #[test]
    fn test_find_latest_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_latest_file(dir.path()), None);

        let older = dir.path().join("older.mp4");
        let newer = dir.path().join("newer.webm");
        std::fs::write(&older, b"a").unwrap();
        std::fs::write(&newer, b"b").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let past = SystemTime::now() - Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(&older)
            .unwrap()
            .set_modified(past)
            .unwrap();

        assert_eq!(find_latest_file(dir.path()), Some(newer));
    }

    #[test]
    fn test_find_latest_file_missing_dir() {
        assert_eq!(find_latest_file(Path::new("/definitely/not/here")), None);
    }
}
