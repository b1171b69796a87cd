pub mod adb;
pub mod cert_installer;
pub mod commands;
pub mod config;
pub mod error;
pub mod keys;
pub mod logging;
pub mod models;
pub mod server;
pub mod state;
pub mod tools;
pub mod ui_capture;
pub mod ui_xml;
