pub mod chat;
pub mod database;
pub mod preferences;
pub mod settings;
pub mod state;
pub mod storage;
pub mod store;

pub use database::Database;
pub use preferences::PreferencesService;
pub use settings::{AppSettings, SettingsService};
pub use state::{ChatState, StateError};
pub use storage::KeyValueStore;
pub use store::ChatStore;
