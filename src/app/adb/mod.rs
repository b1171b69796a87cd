pub mod executor;
pub mod locator;
pub mod parse;
pub mod runner;
