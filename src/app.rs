use std::path::{Path, PathBuf};
use std::time::Duration;

use iced::{window, Subscription, Task};

use crate::application::{event_channel, spawn_download, EventReceiver};
use crate::domain::{AppError, DownloadEvent, DownloadRequest};
use crate::tools::ToolConfig;
use crate::ui::{DownloadMessage, DownloadView};
use crate::utils::{open_folder, validate_url};

/// How often worker events are pulled into the UI
const POLL_INTERVAL: Duration = Duration::from_millis(120);

pub struct DownloadApp {
    view: DownloadView,
    config: ToolConfig,
    // Present only while a run is in flight
    events: Option<EventReceiver>,
    active_request: Option<DownloadRequest>,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new(ToolConfig::default())
    }
}

impl DownloadApp {
    pub fn new(config: ToolConfig) -> Self {
        Self {
            view: DownloadView::default(),
            config,
            events: None,
            active_request: None,
        }
    }

    fn start_download(&mut self) -> Task<Message> {
        if self.view.session.busy {
            return Task::none();
        }

        let url = match validate_url(&self.view.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Rejected URL {:?}", self.view.url);
                return dialog(
                    rfd::MessageLevel::Warning,
                    "Invalid URL",
                    format!(
                        "{}.\nPaste a valid TikTok link.\ne.g. https://www.tiktok.com/@user/video/...",
                        e
                    ),
                );
            }
        };

        let Some(request) = self.view.session.begin(url) else {
            return Task::none();
        };
        self.view.progress = 0.0;
        self.view.status_message = "Starting...".to_string();

        let (tx, rx) = event_channel();
        match spawn_download(self.config.clone(), request.clone(), tx) {
            Ok(_) => {
                self.events = Some(rx);
                self.active_request = Some(request);
                Task::none()
            }
            Err(e) => {
                let error = AppError::Worker(format!("could not start download thread: {}", e));
                self.view.apply(&DownloadEvent::Failed(error.clone()));
                dialog(rfd::MessageLevel::Error, "Error", error.to_string())
            }
        }
    }

    fn poll_events(&mut self) -> Task<Message> {
        let events = match self.events.as_mut() {
            Some(rx) => rx.drain(),
            None => return Task::none(),
        };

        let mut tasks = Vec::new();
        for event in events {
            self.view.apply(&event);
            if event.is_terminal() {
                self.events = None;
                let request = self.active_request.take();
                tasks.push(on_run_finished(event, request));
            }
        }
        Task::batch(tasks)
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    FolderSelected(Option<PathBuf>),
    /// Timer tick that drains the worker queue
    Tick,
    /// Carries the folder to reveal once the user dismisses the dialog
    DialogClosed(Option<PathBuf>),
    CloseRequested(window::Id),
    CloseConfirmed(bool),
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::DownloadPressed => return app.start_download(),
                DownloadMessage::ChooseFolderPressed if !app.view.session.busy => {
                    let current = app.view.session.output_dir.clone();
                    return Task::perform(
                        async move {
                            rfd::AsyncFileDialog::new()
                                .set_directory(&current)
                                .pick_folder()
                                .await
                                .map(|handle| handle.path().to_path_buf())
                        },
                        Message::FolderSelected,
                    );
                }
                _ => {}
            }
        }
        Message::FolderSelected(folder) => {
            if let Some(folder) = folder {
                tracing::info!("Destination folder: {}", folder.display());
                app.view.session.output_dir = folder;
            }
        }
        Message::Tick => return app.poll_events(),
        Message::DialogClosed(folder) => {
            if let Some(folder) = folder {
                open_folder(&folder);
            }
        }
        Message::CloseRequested(id) => {
            tracing::debug!("Close requested for window {:?}", id);
            if !app.view.session.busy {
                return iced::exit();
            }
            return Task::perform(
                async {
                    rfd::AsyncMessageDialog::new()
                        .set_level(rfd::MessageLevel::Warning)
                        .set_title("Quit")
                        .set_description("A download is in progress.\nQuit anyway?")
                        .set_buttons(rfd::MessageButtons::YesNo)
                        .show()
                        .await
                        == rfd::MessageDialogResult::Yes
                },
                Message::CloseConfirmed,
            );
        }
        Message::CloseConfirmed(quit) => {
            if quit {
                tracing::warn!("Closing with a download still running");
                return iced::exit();
            }
        }
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}

pub fn subscription(_app: &DownloadApp) -> Subscription<Message> {
    Subscription::batch([
        iced::time::every(POLL_INTERVAL).map(|_| Message::Tick),
        window::close_requests().map(Message::CloseRequested),
    ])
}

fn on_run_finished(event: DownloadEvent, request: Option<DownloadRequest>) -> Task<Message> {
    match event {
        DownloadEvent::Completed(path) => {
            let reveal = folder_to_open(&path, request.as_ref());
            dialog_then(
                rfd::MessageLevel::Info,
                "Completed",
                format!("Done ✅\nFinal file:\n{}", path.display()),
                reveal,
            )
        }
        DownloadEvent::Failed(e) => dialog(rfd::MessageLevel::Error, "Error", e.to_string()),
        _ => Task::none(),
    }
}

fn folder_to_open(path: &Path, request: Option<&DownloadRequest>) -> Option<PathBuf> {
    if request.is_some_and(|r| r.open_folder_on_completion) {
        path.parent().map(Path::to_path_buf)
    } else {
        None
    }
}

fn dialog(level: rfd::MessageLevel, title: &'static str, description: String) -> Task<Message> {
    dialog_then(level, title, description, None)
}

fn dialog_then(
    level: rfd::MessageLevel,
    title: &'static str,
    description: String,
    reveal: Option<PathBuf>,
) -> Task<Message> {
    Task::perform(
        async move {
            rfd::AsyncMessageDialog::new()
                .set_level(level)
                .set_title(title)
                .set_description(description)
                .set_buttons(rfd::MessageButtons::Ok)
                .show()
                .await;
        },
        move |_| Message::DialogClosed(reveal.clone()),
    )
}
