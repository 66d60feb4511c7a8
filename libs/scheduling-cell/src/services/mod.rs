pub mod validator;
pub mod locks;
pub mod booking;

pub use validator::*;
pub use locks::RoomLocks;
pub use booking::SchedulingService;
