#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]

#[macro_use]
pub mod environment;

pub mod arg_parser;
pub mod cache;
pub mod configuration;
pub mod coordinator;
pub mod document;
pub mod run_cli;
pub mod tools;
pub mod utils;
