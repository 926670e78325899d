//! HTTP handlers for the trivia service.

pub mod auth;
pub mod trivia;
pub mod waitlist;
