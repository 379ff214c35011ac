//! Domain services shared by the HTTP routes and the background scheduler.

pub mod ai;
pub mod analysis;
pub mod email;
pub mod notification;
pub mod scheduler;
pub mod security;
