pub mod bsp;

pub use bsp::BspProvider;
