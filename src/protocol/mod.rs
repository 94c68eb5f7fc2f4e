//! WebSocket protocol message types.
//!
//! Both endpoints speak the same single message shape, the [`Envelope`].
//!
//! # Protocol Overview
//!
//! | Envelope | `identifier` | `callbackId` | Purpose |
//! |----------|--------------|--------------|---------|
//! | Send | handler name | `null` | Fire-and-forget call |
//! | Request | handler name | correlation ID | Call expecting a reply |
//! | Reply | correlation ID | `null` | Result of a request |
//! | Control | `@Directive` | `null` | Framework-internal directive |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `control` | Reserved `@` directives |
//! | `envelope` | Envelope codec and argument normalization |

// ============================================================================
// Submodules
// ============================================================================

/// Control-plane directives.
pub mod control;

/// Envelope codec.
pub mod envelope;

// ============================================================================
// Constants
// ============================================================================

/// Prefix reserving an identifier for control-plane directives.
///
/// Application code must never register a handler under such a name.
pub const CONTROL_SIGIL: char = '@';

// ============================================================================
// Re-exports
// ============================================================================

pub use control::ControlDirective;
pub use envelope::{Envelope, collapse_reply, to_args};
