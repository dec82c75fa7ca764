pub mod analysis;
pub mod intake;
pub mod sessions;
pub mod users;
