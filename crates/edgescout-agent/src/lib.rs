pub mod cli;
pub mod config;
pub mod container;
pub mod detect;
pub mod inventory;
pub mod probe;
pub mod publisher;
pub mod signals;
