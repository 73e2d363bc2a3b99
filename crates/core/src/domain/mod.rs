pub mod employee;
pub mod time_entry;
