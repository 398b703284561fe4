pub mod catalog;
pub mod client;
pub mod request;
pub mod response;
pub mod traits;
pub mod types;

pub use client::{CustomMethod, PollinationsClient};
pub use request::{classify_intent, Intent, RequestPlan};
pub use traits::AssistantBackend;
pub use types::{ApiError, AudioClip, HistoryTurn, ImageReply, TextReply, TextRequest};
