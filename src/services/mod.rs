pub mod access;
pub mod booking;
pub mod courts;
