pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod reaper;
pub mod repository;
pub mod routes;
pub mod utils;
