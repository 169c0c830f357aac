//! HTTP handlers

pub mod alert;
pub mod flows;
pub mod health;
