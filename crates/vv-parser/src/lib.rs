//! Text parsers for ice-sheet model run artifacts.
//!
//! Two stateless extractors live here: the sectioned key/value reader for
//! model configuration files, and the scraper that pulls run metadata out of
//! free-form solver logs.

pub mod config;
pub mod runlog;

pub use config::{ConfigTable, ParseError, parse_config, parse_config_file};
pub use runlog::{Dycore, LogRecord, LogScraper, NOT_AVAILABLE};
