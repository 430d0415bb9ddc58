pub mod acceptance;
pub mod bits;
pub mod instance;
pub mod params;
