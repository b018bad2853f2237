//! Cache key derivation.

use crate::id::JobId;

/// Separator between key segments.
pub const KEY_SEPARATOR: char = ':';

/// Derives the store key for one job of one logical operation.
pub trait KeyBuilder: Send + Sync {
    fn build(&self, namespace: &str, job_id: &JobId) -> String;
}

/// `[prefix:]namespace:jobId`.
///
/// `JobId` never contains [`KEY_SEPARATOR`], so a client-supplied id cannot
/// reach into a nested namespace such as `a:b` from namespace `a`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespacedKeyBuilder {
    prefix: Option<String>,
}

impl NamespacedKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a global prefix, e.g. to share a Redis database with other users.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: (!prefix.is_empty()).then_some(prefix),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

impl KeyBuilder for NamespacedKeyBuilder {
    fn build(&self, namespace: &str, job_id: &JobId) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{KEY_SEPARATOR}{namespace}{KEY_SEPARATOR}{job_id}"),
            None => format!("{namespace}{KEY_SEPARATOR}{job_id}"),
        }
    }
}
