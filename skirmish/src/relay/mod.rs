pub mod protocol;
pub mod server;

pub use protocol::{ClientFrame, ErrorCode, RelayFrame, RoomInfo};
pub use server::{RelayError, RoomCode, run};
