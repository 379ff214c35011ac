//! ETF investment backend: accounts, ETF catalogue, recurring investment
//! plans, AI-backed advice and investment-day notifications.

pub mod config;
pub mod entities;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod schemas;
pub mod services;
pub mod state;
pub mod timezone;
