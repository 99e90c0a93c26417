//! CLI module for refinr - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
