pub mod download_coordinator;
pub mod events;

pub use download_coordinator::spawn_download;
pub use events::{event_channel, EventReceiver};
