pub mod conversation;
pub mod folder;
pub mod message;
pub mod template;

pub use conversation::Conversation;
pub use folder::Folder;
pub use message::{Message, Role};
pub use template::{insert_template, Template};
