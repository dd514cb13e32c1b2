use serde::{Deserialize, Serialize};

/// What the caller is trying to get done in this conversation. Resolved
/// once, then fixed until the session resets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Book,
    Check,
    Cancel,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Book => "book",
            Intent::Check => "check",
            Intent::Cancel => "cancel",
        }
    }
}
