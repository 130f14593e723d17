pub mod booking;
pub mod client;
pub mod message;
pub mod trip;
