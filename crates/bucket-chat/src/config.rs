//! Chat configuration loaded from environment variables.
//!
//! Every setting has a default, so a participant works against local disk
//! with zero configuration.

/// Default storage location when none is configured.
pub const DEFAULT_STORAGE_URI: &str = "./chat_storage";

/// Chat configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Where rooms are stored: a bare path, `file://`, `s3://`, `gs://`,
    /// `az://` or `memory://`.
    /// Env: `BUCKET_CHAT_STORAGE`
    /// Default: `./chat_storage`
    pub storage_uri: String,

    /// Messages returned by [`recent_messages`](crate::Participant::recent_messages)
    /// when no limit is given.
    /// Env: `BUCKET_CHAT_HISTORY_LIMIT`
    /// Default: `50`
    pub history_limit: usize,

    /// How many of the newest segments a history read scans.
    /// Env: `BUCKET_CHAT_RECENT_SEGMENTS`
    /// Default: `10`
    pub recent_segments: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            storage_uri: DEFAULT_STORAGE_URI.to_string(),
            history_limit: 50,
            recent_segments: 10,
        }
    }
}

impl ChatConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(uri) = lookup("BUCKET_CHAT_STORAGE") {
            if uri.trim().is_empty() {
                tracing::warn!("Empty BUCKET_CHAT_STORAGE, using default");
            } else {
                config.storage_uri = uri;
            }
        }

        if let Some(val) = lookup("BUCKET_CHAT_HISTORY_LIMIT") {
            match parse_count(&val) {
                Some(n) => config.history_limit = n,
                None => tracing::warn!(value = %val, "Invalid BUCKET_CHAT_HISTORY_LIMIT, using default"),
            }
        }

        if let Some(val) = lookup("BUCKET_CHAT_RECENT_SEGMENTS") {
            match parse_count(&val) {
                Some(n) => config.recent_segments = n,
                None => tracing::warn!(value = %val, "Invalid BUCKET_CHAT_RECENT_SEGMENTS, using default"),
            }
        }

        config
    }

    /// Same settings, different storage.
    pub fn with_storage_uri(mut self, uri: &str) -> Self {
        self.storage_uri = uri.to_string();
        self
    }
}

/// A positive count.
fn parse_count(val: &str) -> Option<usize> {
    val.trim().parse::<usize>().ok().filter(|n| *n > 0)
}
