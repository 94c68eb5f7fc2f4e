//! Per-connection callback registries.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `handler` | Remote-callable message handlers |
//! | `listener` | Local event listeners |

// ============================================================================
// Submodules
// ============================================================================

/// Message handler table.
pub mod handler;

/// Event listener registry.
pub mod listener;

// ============================================================================
// Re-exports
// ============================================================================

pub use handler::{Handler, HandlerFuture, HandlerTable};
pub use listener::{ConnectionEvent, EventKind, Listener, ListenerRegistry};
