//! Control-plane directives.
//!
//! Identifiers starting with [`CONTROL_SIGIL`](super::CONTROL_SIGIL) are
//! reserved for the framework. They are handled by the connection itself and
//! never reach message handlers or message listeners.
//!
//! | Directive | Payload | Effect |
//! |-----------|---------|--------|
//! | `@SetCookie` | `[name, value]` | Stores a cookie on the connection |
//! | `@DelCookie` | `[name]` | Removes a cookie from the connection |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::Value;

use super::envelope::arg_str;

// ============================================================================
// ControlDirective
// ============================================================================

/// A parsed control-plane directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlDirective {
    /// Store `name = value` in the connection's cookie store.
    SetCookie {
        /// Cookie name.
        name: String,
        /// Cookie value.
        value: String,
    },
    /// Remove `name` from the connection's cookie store.
    DelCookie {
        /// Cookie name.
        name: String,
    },
    /// Reserved identifier this endpoint does not understand.
    Unknown(String),
}

impl ControlDirective {
    /// Identifier of the set-cookie directive.
    pub const SET_COOKIE: &'static str = "@SetCookie";

    /// Identifier of the delete-cookie directive.
    pub const DEL_COOKIE: &'static str = "@DelCookie";

    /// Parses a directive from a reserved identifier and its arguments.
    ///
    /// A known directive with a missing or non-string argument is reported
    /// as [`ControlDirective::Unknown`] so it is logged and dropped.
    #[must_use]
    pub fn parse(identifier: &str, args: &[Value]) -> Self {
        match identifier {
            Self::SET_COOKIE => match (arg_str(args, 0), arg_str(args, 1)) {
                (Some(name), Some(value)) => Self::SetCookie {
                    name: name.to_string(),
                    value: value.to_string(),
                },
                _ => Self::Unknown(identifier.to_string()),
            },
            Self::DEL_COOKIE => match arg_str(args, 0) {
                Some(name) => Self::DelCookie {
                    name: name.to_string(),
                },
                None => Self::Unknown(identifier.to_string()),
            },
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ControlDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetCookie { name, .. } => write!(f, "{} {name}", Self::SET_COOKIE),
            Self::DelCookie { name } => write!(f, "{} {name}", Self::DEL_COOKIE),
            Self::Unknown(identifier) => write!(f, "{identifier}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
