pub mod announcement;
pub mod announcer;
pub mod app;
pub mod audio;
pub mod board;
pub mod config;
pub mod detector;
pub mod locator;
pub mod logging;
pub mod regen;
pub mod schedule;
pub mod server;
pub mod switch;
