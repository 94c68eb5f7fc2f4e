//! Envelope message type.
//!
//! The envelope is the only wire unit; it travels in both directions, one
//! envelope per WebSocket text frame.
//!
//! # Format
//!
//! ```json
//! {
//!   "identifier": "echo",
//!   "message": ["hi"],
//!   "callbackId": "550e8400-e29b-41d4-a716-446655440000"
//! }
//! ```
//!
//! A reply is an ordinary envelope addressed to the caller's correlation ID:
//!
//! ```json
//! { "identifier": "550e8400-e29b-41d4-a716-446655440000", "message": ["hi!"], "callbackId": null }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

use super::CONTROL_SIGIL;

// ============================================================================
// Envelope
// ============================================================================

/// A decoded wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Handler name, correlation ID of a reply, or `@`-prefixed directive.
    pub identifier: String,

    /// Positional arguments (usually an array).
    #[serde(default)]
    pub message: Value,

    /// Present when the sender expects a reply.
    #[serde(rename = "callbackId", default)]
    pub callback_id: Option<String>,
}

impl Envelope {
    /// Creates an envelope from already-normalized arguments.
    #[inline]
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        args: Vec<Value>,
        callback_id: Option<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            message: Value::Array(args),
            callback_id,
        }
    }

    /// Serializes an envelope to text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] only if `args` contain values serde_json
    /// refuses, which cannot happen for a [`Value`] built by this crate.
    pub fn encode(identifier: &str, args: &[Value], callback_id: Option<&str>) -> Result<String> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            identifier: &'a str,
            message: &'a [Value],
            #[serde(rename = "callbackId")]
            callback_id: Option<&'a str>,
        }

        let text = serde_json::to_string(&Borrowed {
            identifier,
            message: args,
            callback_id,
        })?;
        Ok(text)
    }

    /// Serializes this envelope to text.
    ///
    /// # Errors
    ///
    /// See [`Envelope::encode`].
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses an envelope from text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedEnvelope`] if the text is not a JSON object
    /// or lacks a string `identifier`.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::malformed(format!("invalid JSON: {e}")))?;

        let Value::Object(mut object) = value else {
            return Err(Error::malformed("envelope is not an object"));
        };

        let identifier = match object.remove("identifier") {
            Some(Value::String(identifier)) => identifier,
            Some(_) => return Err(Error::malformed("identifier is not a string")),
            None => return Err(Error::malformed("missing identifier")),
        };

        let message = object.remove("message").unwrap_or(Value::Null);

        let callback_id = match object.remove("callbackId") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id),
            Some(_) => return Err(Error::malformed("callbackId is not a string")),
        };

        Ok(Self {
            identifier,
            message,
            callback_id,
        })
    }

    /// Returns `true` if the identifier is a reserved control directive.
    #[inline]
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.identifier.starts_with(CONTROL_SIGIL)
    }

    /// Returns `true` if the sender expects a reply.
    #[inline]
    #[must_use]
    pub fn expects_reply(&self) -> bool {
        self.callback_id.is_some()
    }

    /// Returns the payload as positional arguments.
    ///
    /// An array yields its elements, `null` yields nothing, and any other
    /// value is a single argument.
    #[must_use]
    pub fn args(&self) -> Vec<Value> {
        normalize(self.message.clone())
    }

    /// Consumes the envelope, returning positional arguments.
    #[must_use]
    pub fn into_args(self) -> Vec<Value> {
        normalize(self.message)
    }
}

// ============================================================================
// Arguments
// ============================================================================

/// Converts caller arguments into a positional list.
///
/// Tuples and sequences become the list itself, `()` becomes the empty list,
/// any other value becomes a single argument. Use a 1-tuple to pass a
/// sequence as one argument: `(vec![1, 2],)`.
///
/// # Errors
///
/// Returns [`Error::NonSerializableArgument`] if any part of `args` fails to
/// serialize.
pub fn to_args<T: Serialize>(args: T) -> Result<Vec<Value>> {
    let value = serde_json::to_value(args).map_err(|e| Error::non_serializable(e.to_string()))?;
    Ok(normalize(value))
}

/// Collapses reply arguments into the value handed to a waiter.
///
/// Exactly one argument is returned as-is; anything else is returned as the
/// full array.
#[must_use]
pub fn collapse_reply(mut args: Vec<Value>) -> Value {
    if args.len() == 1 {
        args.pop().unwrap_or(Value::Null)
    } else {
        Value::Array(args)
    }
}

fn normalize(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Reads a string argument at `index`, if present.
#[inline]
#[must_use]
pub fn arg_str(args: &[Value], index: usize) -> Option<&str> {
    args.get(index).and_then(Value::as_str)
}

// ============================================================================
// Tests
// ============================================================================
