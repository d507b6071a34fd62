/// Topic-tagged messages as carried by the local publish/subscribe bus
///
/// One message is a topic frame followed by a JSON frame. On line-oriented
/// transports both frames share a line, separated by the first whitespace.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::errors::EnvelopeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    PoseData,
    FeatureData,
    FallAlert,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::PoseData => "PoseData",
            Topic::FeatureData => "FeatureData",
            Topic::FallAlert => "FallAlert",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Topic {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PoseData" => Ok(Topic::PoseData),
            "FeatureData" => Ok(Topic::FeatureData),
            "FallAlert" => Ok(Topic::FallAlert),
            other => Err(EnvelopeError::UnknownTopic(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub topic: Topic,
    pub payload: Value,
}

impl Envelope {
    pub fn new<T: Serialize>(topic: Topic, payload: &T) -> Result<Self, EnvelopeError> {
        Ok(Self {
            topic,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Encode as a single `<Topic> <json>` line without trailing newline
    pub fn to_line(&self) -> String {
        format!("{} {}", self.topic, self.payload)
    }

    pub fn parse_line(line: &str) -> Result<Self, EnvelopeError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(EnvelopeError::Empty);
        }

        let (topic, payload) = line
            .split_once(char::is_whitespace)
            .ok_or(EnvelopeError::MissingPayload)?;

        Ok(Self {
            topic: topic.parse()?,
            payload: serde_json::from_str(payload.trim_start())?,
        })
    }

    pub fn decode<T: serde::de::DeserializeOwned>(self) -> Result<T, EnvelopeError> {
        Ok(serde_json::from_value(self.payload)?)
    }
}
