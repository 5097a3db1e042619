pub mod prediction;
pub mod stock;
