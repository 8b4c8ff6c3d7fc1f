#[macro_use]
extern crate error_chain;

pub mod errors;
pub mod config;
pub mod cmd;
pub mod model;
pub mod fs;
