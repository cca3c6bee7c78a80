pub mod cli;
pub mod config;
pub mod detect;
pub mod discover;
pub mod error;
pub mod model;
pub mod parsers;
pub mod paths;
pub mod project;
pub mod report;
pub mod repository;
