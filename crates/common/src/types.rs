use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Notification delivery channel.
///
/// Travels over the queue as its lowercase name. Names this build does not
/// know are preserved as [`NotificationKind::Other`] so that the dispatch layer
/// can reject them explicitly instead of failing at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    Email,
    Push,
    Other(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::Email => "email",
            NotificationKind::Push => "push",
            NotificationKind::Other(name) => name,
        }
    }
}

impl From<String> for NotificationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "email" => NotificationKind::Email,
            "push" => NotificationKind::Push,
            _ => NotificationKind::Other(value),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(value: NotificationKind) -> Self {
        match value {
            NotificationKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A notification job carried over the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub kind: NotificationKind,
    /// Email address for [`NotificationKind::Email`], device id for
    /// [`NotificationKind::Push`]. Never validated against `kind`.
    pub recipient: String,
}

const FIRST_NAMES: &[&str] = &[
    "alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi", "ivan", "judy",
];
const LAST_NAMES: &[&str] = &[
    "smith", "jones", "taylor", "brown", "wilson", "evans", "thomas", "roberts",
];
const DOMAINS: &[&str] = &["example.com", "example.org", "mail.test", "inbox.test"];

impl NotificationMessage {
    pub fn new(kind: NotificationKind, recipient: impl Into<String>) -> Self {
        Self {
            kind,
            recipient: recipient.into(),
        }
    }

    /// Build a random job: an email to a synthetic address or a push to a
    /// fresh device id, with equal probability.
    ///
    /// Draws from the thread-local generator, which is seeded once per thread.
    pub fn new_random() -> Self {
        let mut rng = rand::thread_rng();

        if rng.gen_bool(0.5) {
            Self::new(NotificationKind::Email, random_email(&mut rng))
        } else {
            Self::new(NotificationKind::Push, Uuid::new_v4().to_string())
        }
    }

    /// Serialize into the queue body format.
    pub fn encode(&self) -> Result<Vec<u8>, AppError> {
        bincode::serialize(self).map_err(|e| AppError::Encode(e.to_string()))
    }

    /// Parse a queue body produced by [`NotificationMessage::encode`].
    pub fn decode(data: &[u8]) -> Result<Self, AppError> {
        bincode::deserialize(data).map_err(|e| AppError::Decode(e.to_string()))
    }
}

fn random_email(rng: &mut impl Rng) -> String {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("user");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("name");
    let domain = DOMAINS.choose(rng).copied().unwrap_or("example.com");
    let suffix: u16 = rng.gen_range(0..1000);
    format!("{first}.{last}{suffix}@{domain}")
}
