use std::fmt;

/// Globally unique identifier for one emitted content block.
///
/// Ids are minted once by the step identity registry and never reused;
/// downstream consumers may use them as join keys.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BlockId(pub uuid::Uuid);

impl BlockId {
    pub(crate) fn mint() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier for one logical provider message.
///
/// Either minted speculatively by the engine or revealed by the provider
/// mid-stream; the message identity cache reconciles the two.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Creates a message id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub(crate) fn mint() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the message id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
