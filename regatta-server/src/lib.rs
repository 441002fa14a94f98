pub mod config;
pub mod persistance;
pub mod routes;
pub mod security;
pub mod service;
pub mod views;
