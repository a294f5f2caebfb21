pub mod connection;
pub mod handler;
pub mod server;

pub use server::{new_state, run, serve, SharedState};
