pub mod availability;
pub mod booking;

pub use availability::{OperatingWindow, Slot, TimeRange};
pub use booking::{Booking, BookingStatus, CreateBookingRequest, NewBooking, UpdateBookingRequest};
