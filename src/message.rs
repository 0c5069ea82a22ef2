//! Message envelope handled by the redelivery coordinator.
//!
//! A [`Message`] is an opaque payload plus a string-keyed bag of application
//! properties. The payload uses [`Bytes`] so cloning a message for redelivery
//! shares the underlying buffer instead of copying it. The coordinator never
//! mutates a received message; replacements are derived copies built by the
//! transition step.
//!
//! One property key is reserved: the attempt counter read and written by the
//! `attempt` module. Everything else in the bag is passed through untouched.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

/// A loosely typed application property value.
///
/// This is the one deliberately untyped boundary of the crate; typed reads
/// over it (the attempt counter) live in [`crate::attempt`].
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    /// Borrow the integer value, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::String(v) => write!(f, "{}", v),
        }
    }
}

/// A broker message: opaque body, application properties, and an optional
/// scheduled enqueue time (the earliest instant the broker should make the
/// message visible to consumers).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    body: Bytes,
    properties: HashMap<String, PropertyValue>,
    scheduled_enqueue_time: Option<SystemTime>,
}

impl Message {
    /// Create a message with the given body and no properties.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into(), properties: HashMap::new(), scheduled_enqueue_time: None }
    }

    /// Builder-style property insertion.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The opaque payload.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Look up an application property.
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// All application properties.
    pub fn properties(&self) -> &HashMap<String, PropertyValue> {
        &self.properties
    }

    /// Insert or replace an application property.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(key.into(), value.into());
    }

    /// The scheduled enqueue time, if one was set.
    pub fn scheduled_enqueue_time(&self) -> Option<SystemTime> {
        self.scheduled_enqueue_time
    }

    /// Set the earliest time the broker should deliver this message.
    pub fn set_scheduled_enqueue_time(&mut self, at: SystemTime) {
        self.scheduled_enqueue_time = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn new_message_has_no_properties_or_schedule() {
        let msg = Message::new("payload");
        assert_eq!(msg.body(), &Bytes::from("payload"));
        assert!(msg.properties().is_empty());
        assert!(msg.scheduled_enqueue_time().is_none());
    }

    #[test]
    fn with_property_round_trips() {
        let msg = Message::new("x").with_property("tenant", "acme").with_property("count", 7i64);
        assert_eq!(msg.property("tenant"), Some(&PropertyValue::String("acme".into())));
        assert_eq!(msg.property("count").and_then(PropertyValue::as_int), Some(7));
        assert!(msg.property("missing").is_none());
    }

    #[test]
    fn set_property_replaces_existing() {
        let mut msg = Message::new("x").with_property("count", 1i64);
        msg.set_property("count", 2i64);
        assert_eq!(msg.property("count").and_then(PropertyValue::as_int), Some(2));
    }

    #[test]
    fn as_int_rejects_other_variants() {
        assert_eq!(PropertyValue::Bool(true).as_int(), None);
        assert_eq!(PropertyValue::String("5".into()).as_int(), None);
        assert_eq!(PropertyValue::Float(5.0).as_int(), None);
    }

    #[test]
    fn clone_shares_body() {
        let msg = Message::new(Bytes::from(vec![0u8; 64]));
        let copy = msg.clone();
        assert_eq!(copy.body(), msg.body());
    }

    #[test]
    fn scheduled_enqueue_time_is_settable() {
        let mut msg = Message::new("x");
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        msg.set_scheduled_enqueue_time(at);
        assert_eq!(msg.scheduled_enqueue_time(), Some(at));
    }
}
