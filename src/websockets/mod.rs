// Public API
pub use handler::websocket_handler;
pub use messages::{ChatMessage, InboundMessage, MessageError, CHAT_MESSAGE_TYPE};
pub use pump::{ConnectionPump, Disconnect};
pub use socket::{split_socket, Frame, FrameSink, FrameStream, SocketError};

// Internal modules
mod handler;
mod messages;
mod pump;
mod socket;
