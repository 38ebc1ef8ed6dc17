mod api;
mod auth;
mod config;
mod error_disclosure;
mod harness;
mod registrar;
