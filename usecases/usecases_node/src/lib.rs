//! Use Cases Layer: node runtime.
//!
//! Ties the framed peer connections in `adapters_transport` and the epmd
//! client in `adapters_epmd` to a local registry of mailboxes, names, and
//! link/monitor tables, exposed as the single [`Node`] facade.

mod connection;
mod error;
mod mailbox;
mod message;
mod node;
mod registry;
mod verbosity;

pub use entities_atom::Atom;
pub use entities_term::{Pid, Reference, Term};

pub use error::NodeError;
pub use mailbox::Mailbox;
pub use message::{MsgKind, TransportMsg};
pub use node::{Node, SendTarget};
pub use verbosity::{level as verbosity_level, report as verbosity_report, Verbosity};
