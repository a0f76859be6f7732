pub mod config;
pub mod display;
pub mod loader;
pub mod news;
pub mod util;
