pub mod course;
pub mod job;
pub mod roster;
