pub mod export;
pub mod health;
pub mod ngos;
pub mod stats;
pub mod token;
