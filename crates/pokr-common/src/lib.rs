pub mod memory;
pub mod patch;
pub mod protocol;
pub mod remote;
pub mod room;
pub mod room_code;
pub mod store;
