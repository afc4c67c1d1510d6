pub mod bootstrap;
pub mod catalogue;
pub mod cli;
pub mod commands;
pub mod config;
pub mod load;
