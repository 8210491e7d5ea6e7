mod app;
mod application;
mod domain;
mod tools;
mod ui;
mod utils;

use iced::{window, Size};
use tracing_subscriber::EnvFilter;

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tiktok_mp4_downloader=info")),
        )
        .init();

    tracing::info!("Starting TikTok MP4 Downloader");

    iced::application(app::DownloadApp::default, app::update, app::view)
        .title("TikTok Downloader")
        .subscription(app::subscription)
        .window(window::Settings {
            size: Size::new(780.0, 420.0),
            resizable: false,
            // Closing mid-download asks first
            exit_on_close_request: false,
            ..Default::default()
        })
        .run()
}
