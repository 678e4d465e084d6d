/// Destination key construction for migrated sessions.
///
/// Mirrors the Redis session backend: with a prefix the stored key is
/// `prefix:session_key`, without one it is the session key itself.
#[derive(Debug, Clone, Default)]
pub struct KeyContext {
    prefix: Option<String>,
}

impl KeyContext {
    pub fn new(prefix: Option<String>) -> Self {
        let prefix = prefix.filter(|p| !p.is_empty());
        Self { prefix }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn session(&self, session_key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{session_key}"),
            None => session_key.to_string(),
        }
    }
}
