use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

/// A subscription scope. Events are only delivered to subscribers of the
/// topic they were published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Procedure(Uuid),
    Session(Uuid),
    Room(Uuid),
    User(Uuid),
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid topic '{0}', expected <procedure|session|room|user>:<uuid>")]
pub struct InvalidTopic(pub String);

impl From<InvalidTopic> for AppError {
    fn from(err: InvalidTopic) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Procedure(id) => write!(f, "procedure:{}", id),
            Topic::Session(id) => write!(f, "session:{}", id),
            Topic::Room(id) => write!(f, "room:{}", id),
            Topic::User(id) => write!(f, "user:{}", id),
        }
    }
}

impl FromStr for Topic {
    type Err = InvalidTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidTopic(s.to_string());
        let (kind, id) = s.split_once(':').ok_or_else(invalid)?;
        let id = Uuid::parse_str(id).map_err(|_| invalid())?;

        match kind {
            "procedure" => Ok(Topic::Procedure(id)),
            "session" => Ok(Topic::Session(id)),
            "room" => Ok(Topic::Room(id)),
            "user" => Ok(Topic::User(id)),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    ProcedureUpdated,
    VitalsUpdated,
    SessionCreated,
    SessionUpdated,
    SessionDeleted,
    NotificationCreated,
    NotificationRead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub event: EventKind,
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeQuery {
    pub topic: String,
}
