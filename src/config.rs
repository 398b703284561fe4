pub const APP_NAME: &str = "Parley";

// Storage keys
pub const CONVERSATIONS_KEY: &str = "chatbot-conversations";
pub const SELECTED_CONVERSATION_KEY: &str = "chatbot-selected-conversation";
pub const FOLDERS_KEY: &str = "chatbot-folders";
pub const TEMPLATES_KEY: &str = "chatbot-templates";
pub const SETTINGS_KEY: &str = "chatbot-settings";
pub const THEME_KEY: &str = "theme";
pub const SIDEBAR_SECTIONS_KEY: &str = "sidebar-collapsed";
pub const SIDEBAR_COLLAPSED_KEY: &str = "sidebar-collapsed-state";

// Endpoints
pub const DEFAULT_TEXT_ENDPOINT: &str = "https://text.pollinations.ai/openai";
pub const DEFAULT_IMAGE_ENDPOINT: &str = "https://image.pollinations.ai/prompt";
pub const LEGACY_TEXT_ENDPOINT: &str = "https://text.pollinations.ai";
pub const LEGACY_IMAGE_ENDPOINT: &str = "https://image.pollinations.ai";
pub const TRUSTED_IMAGE_HOST: &str = "pollinations.ai";

// Limits
pub const PREVIEW_LEN: usize = 80;
pub const HISTORY_WINDOW: usize = 20;
pub const RECENT_LIMIT: usize = 10;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const IMAGE_SIZE: u32 = 1024;
