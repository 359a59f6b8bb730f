// Public API for integration tests and the console bot

pub mod answer;
pub mod catalog;
pub mod command;
pub mod config;
pub mod game;
pub mod protocol;
pub mod queue;
pub mod room;
pub mod sampler;
pub mod scoreboard;
pub mod types;
