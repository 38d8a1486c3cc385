// services/mod.rs - Domain logic kept apart from HTTP plumbing

pub mod export;
pub mod extraction;
pub mod ngo;
pub mod opportunities;
pub mod scraped;
pub mod scraper_client;
pub mod stats;
