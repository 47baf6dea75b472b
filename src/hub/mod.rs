// Room registry and per-room event loops
//
// Every room runs as its own task and is the only writer of its membership.
// The hub's registry lock is the only lock shared across tasks.

// Public API - what other modules can use
pub use connection::{Connection, ConnectionError, Identity};
pub use registry::Hub;
pub use room::{Room, RoomError};

// Internal modules
mod connection;
mod registry;
mod room;
