//! HTTP request handlers.

pub mod health;
pub mod models;
pub mod predict;
pub mod stations;

#[cfg(test)]
pub(crate) mod test_support;
