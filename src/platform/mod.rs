// Per-OS capture backends and input injectors

pub mod capture;
pub mod input;
