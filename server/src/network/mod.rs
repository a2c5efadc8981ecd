//! Connection layer: telnet framing, login, the line editor and the
//! per-connection task that ties a socket to an entity.

pub mod telnet;
pub mod line;
pub mod editor;
pub mod auth;
pub mod server;

pub use editor::EditTarget;
pub use server::Server;

/// Everything the world can push down a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Markup text, colorized on the way out
    Text(String),
    /// Bytes written as-is (telnet negotiation)
    Raw(Vec<u8>),
    /// Hand the connection to the line editor
    Edit { target: EditTarget, initial: String },
    /// Flush and hang up
    Close,
}
