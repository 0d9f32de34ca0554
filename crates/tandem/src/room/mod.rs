//! Room lifecycle: create, join, lookup, expiry.

mod models;
mod repository;
mod service;

pub use models::{CreateRoomRequest, JoinRoomRequest, Room};
pub use repository::RoomRepository;
pub use service::{JoinedRoom, RoomService, RoomServiceConfig};
