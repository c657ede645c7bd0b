pub mod bookings;
pub mod calendar;
pub mod catalog;
pub mod changes;
pub mod core;
pub mod schedule;
pub mod setup;
pub mod time_slots;
