mod auth;
mod config;
mod server;
