//! The request record and callback-attempt log entry, plus the small
//! closed enums used in place of raw strings for `mode`/`status`/
//! `callback_status`.
//!
//! Serialized the way `hook_common::webhook::HttpMethod` is: a hand-rolled
//! `FromStr`/`Display` pair plus `serde::{Serialize, Deserialize}` built on
//! top of those, so the on-disk column stays a plain `TEXT` value while the
//! in-memory representation cannot hold an illegal state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Sync,
    Async,
}

impl FromStr for RequestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(RequestMode::Sync),
            "async" => Ok(RequestMode::Async),
            other => Err(format!("invalid request mode: {other}")),
        }
    }
}

impl fmt::Display for RequestMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestMode::Sync => write!(f, "sync"),
            RequestMode::Async => write!(f, "async"),
        }
    }
}

impl Serialize for RequestMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RequestMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RequestMode::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Completed,
    Failed,
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "completed" => Ok(RequestStatus::Completed),
            "failed" => Ok(RequestStatus::Failed),
            other => Err(format!("invalid request status: {other}")),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Completed => write!(f, "completed"),
            RequestStatus::Failed => write!(f, "failed"),
        }
    }
}

impl Serialize for RequestStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RequestStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RequestStatus::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    Pending,
    Delivered,
    Failed,
}

impl FromStr for CallbackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CallbackStatus::Pending),
            "delivered" => Ok(CallbackStatus::Delivered),
            "failed" => Ok(CallbackStatus::Failed),
            other => Err(format!("invalid callback status: {other}")),
        }
    }
}

impl fmt::Display for CallbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CallbackStatus::Pending => write!(f, "pending"),
            CallbackStatus::Delivered => write!(f, "delivered"),
            CallbackStatus::Failed => write!(f, "failed"),
        }
    }
}

impl Serialize for CallbackStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CallbackStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CallbackStatus::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// The unit of work and its durable state.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub id: String,
    pub mode: RequestMode,
    pub input_data: String,
    pub iterations: u32,
    pub status: RequestStatus,
    pub result: Option<String>,
    pub duration_ms: Option<f64>,
    pub callback_url: Option<String>,
    pub callback_status: Option<CallbackStatus>,
    pub callback_attempts: u32,
    pub callback_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One append-only row in the delivery trace for a request.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackAttempt {
    pub id: i64,
    pub request_id: String,
    pub attempt_number: u32,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub duration_ms: f64,
    pub created_at: DateTime<Utc>,
}

/// The payload handed to the deliverer on a successful task.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionPayload {
    pub request_id: String,
    pub status: &'static str,
    pub result: String,
    pub iterations: u32,
    pub duration_ms: f64,
}

/// The payload handed to the deliverer when compute fails.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub request_id: String,
    pub status: &'static str,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        for mode in [RequestMode::Sync, RequestMode::Async] {
            assert_eq!(RequestMode::from_str(&mode.to_string()).unwrap(), mode);
        }
        for status in [
            RequestStatus::Pending,
            RequestStatus::Completed,
            RequestStatus::Failed,
        ] {
            assert_eq!(
                RequestStatus::from_str(&status.to_string()).unwrap(),
                status
            );
        }
        for status in [
            CallbackStatus::Pending,
            CallbackStatus::Delivered,
            CallbackStatus::Failed,
        ] {
            assert_eq!(
                CallbackStatus::from_str(&status.to_string()).unwrap(),
                status
            );
        }
    }

    #[test]
    fn rejects_unknown_variant() {
        assert!(RequestMode::from_str("carrier-pigeon").is_err());
    }
}
