pub mod cache;
pub mod catalog;
pub mod gateway;
pub mod loader;

#[cfg(test)]
pub(crate) mod testing;
