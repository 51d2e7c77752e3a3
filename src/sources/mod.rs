//! Price source implementations

pub mod hermes;
pub mod jupiter;
pub mod pyth_account;

pub use hermes::HermesSource;
pub use jupiter::JupiterSource;
pub use pyth_account::PythAccountSource;
