use std::fmt;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

/// Unordered pair of users; `Pair::new(a, b) == Pair::new(b, a)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair(Uuid, Uuid);

impl Pair {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn members(&self) -> (Uuid, Uuid) {
        (self.0, self.1)
    }

    pub fn contains(&self, user: Uuid) -> bool {
        self.0 == user || self.1 == user
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}+{}", self.0, self.1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Uuid,
    pub receiver: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    pub body: String,
}

impl Message {
    pub fn new(sender: Uuid, receiver: Uuid, body: impl Into<String>) -> Self {
        Self {
            sender,
            receiver,
            sent_at: OffsetDateTime::now_utc(),
            body: body.into(),
        }
    }

    pub fn pair(&self) -> Pair {
        Pair::new(self.sender, self.receiver)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.sent_at.format(&Rfc3339) {
            Ok(at) => write!(f, "{} at {at} says {}", self.sender, self.body),
            // rfc3339 has no room for offset seconds or years past 9999
            Err(_) => write!(f, "{} at {} says {}", self.sender, self.sent_at, self.body),
        }
    }
}
