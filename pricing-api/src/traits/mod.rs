pub mod clock;
pub mod connection;
pub mod notification;
