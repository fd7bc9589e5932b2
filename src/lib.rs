pub mod app;
pub mod catalog;
pub mod config;
pub mod deck;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod inaturalist;
pub mod ledger;
pub mod literal;
pub mod output;
