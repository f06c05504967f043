pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from};
pub use schema::{
    default_keywords, normalize_keywords, Config, ImapSettings, StoreSettings,
    DEFAULT_QUERY_KEYWORDS,
};
