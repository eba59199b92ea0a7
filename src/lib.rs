pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod notice;
pub mod routes;
pub mod services;
pub mod state;
