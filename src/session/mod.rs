// Public API - what other modules can use
pub use handlers::create_session;
pub use token::IdentityTokens;
pub use types::SessionResponse;

// Internal modules
mod handlers;
mod token;
mod types;
