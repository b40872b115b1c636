pub mod adapters;
pub mod config;
pub mod error;
pub mod session;

#[cfg(test)]
mod fakes;
