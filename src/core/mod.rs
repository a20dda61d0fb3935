pub mod config;
pub mod normalize;
pub mod registry;
pub mod session;
pub mod source;
pub mod transform;

#[cfg(test)]
pub mod testing;
