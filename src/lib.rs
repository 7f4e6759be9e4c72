pub mod config;
pub mod crawler;
pub mod error;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod scrapers;
pub mod store;

#[cfg(test)]
mod testing;
