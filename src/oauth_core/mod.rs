pub mod types;
pub mod error;
pub mod context;
pub mod config;
pub mod strategy;
pub mod oauth_provider;
pub mod grant_helpers;
pub mod memory;
pub mod crypto;

#[cfg(test)]
mod test;
