#![forbid(unsafe_code)]

pub mod app;
pub mod articles;
pub mod assistant;
pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod formats;
pub mod gemini;
pub mod logging;
pub mod pubs;
pub mod tagging;
