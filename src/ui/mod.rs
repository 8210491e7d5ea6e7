use iced::{
    widget::{button, checkbox, column, progress_bar, row, text, text_input, Space},
    Alignment, Element, Length,
};

use crate::domain::{DownloadEvent, DownloadPhase, Session};

fn ready_text() -> String {
    DownloadPhase::Idle.status_text().unwrap_or_default().to_string()
}

/// Main view state
pub struct DownloadView {
    pub url: String,
    pub status_message: String,
    /// 0.0 to 100.0
    pub progress: f32,
    pub session: Session,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            url: String::new(),
            status_message: ready_text(),
            progress: 0.0,
            session: Session::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    ChooseFolderPressed,
    OpenFolderToggled(bool),
    DownloadPressed,
    ClearPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                if !self.session.busy {
                    self.url = url;
                }
            }
            DownloadMessage::OpenFolderToggled(open) => {
                self.session.open_folder_on_completion = open;
            }
            DownloadMessage::ClearPressed => {
                if !self.session.busy {
                    self.url.clear();
                    self.progress = 0.0;
                    self.status_message = ready_text();
                }
            }
            DownloadMessage::ChooseFolderPressed | DownloadMessage::DownloadPressed => {
                // Will be handled by the app
            }
        }
    }

    /// Reflect a worker event in the form
    pub fn apply(&mut self, event: &DownloadEvent) {
        match event {
            DownloadEvent::Status(message) => self.status_message = message.clone(),
            DownloadEvent::Progress(percent) => self.progress = percent.clamp(0.0, 100.0),
            DownloadEvent::Completed(path) => {
                self.session.finish();
                self.status_message = format!("Saved: {}", path.display());
            }
            DownloadEvent::Failed(e) => {
                self.session.finish();
                let message = e.to_string();
                self.status_message = message.lines().next().unwrap_or_default().to_string();
            }
        }
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let idle = !self.session.busy;

        let header = row![
            text("TikTok Downloader").size(28),
            text("TikTok only · compatible MP4 output").size(14),
        ]
        .spacing(16)
        .align_y(Alignment::End);

        let folder = row![
            text(self.session.output_dir.display().to_string())
                .size(13)
                .width(Length::Fill),
            button("Choose folder...")
                .on_press_maybe(idle.then_some(DownloadMessage::ChooseFolderPressed))
                .padding([6, 12]),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let actions = row![
            button("Download")
                .on_press_maybe(idle.then_some(DownloadMessage::DownloadPressed))
                .padding([10, 20]),
            button("Clear")
                .on_press_maybe(idle.then_some(DownloadMessage::ClearPressed))
                .padding([10, 20]),
        ]
        .spacing(10);

        column![
            header,
            Space::new().height(Length::Fixed(10.0)),
            text("TikTok video URL:").size(16),
            text_input("https://www.tiktok.com/@user/video/...", &self.url)
                .on_input_maybe(idle.then_some(DownloadMessage::UrlChanged))
                .padding(10),
            text("Destination folder:").size(16),
            folder,
            checkbox(self.session.open_folder_on_completion)
                .label("Open folder when finished")
                .on_toggle(DownloadMessage::OpenFolderToggled),
            actions,
            progress_bar(0.0..=100.0, self.progress),
            text(&self.status_message).size(14),
        ]
        .padding(20)
        .spacing(10)
        .into()
    }
}
