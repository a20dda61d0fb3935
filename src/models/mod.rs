// Data models for desktop capture and input injection

pub mod capture;
pub mod input;
