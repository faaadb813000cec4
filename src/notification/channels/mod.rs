//! 具体后端实现

pub mod ai;
pub mod command;
pub mod desktop;
pub mod log;
pub mod sessions;
pub mod sound;
pub mod speech;
pub mod system;
pub mod webhook;

pub use ai::{AiConfig, OpenAiGenerator};
pub use desktop::CommandDesktop;
pub use log::LogBackend;
pub use sessions::ParentCache;
pub use sound::CommandSound;
pub use speech::CommandSpeech;
pub use system::CommandSystem;
pub use webhook::DiscordWebhook;
