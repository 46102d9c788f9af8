pub mod booking;
pub mod password;
