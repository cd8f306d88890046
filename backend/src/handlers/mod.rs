// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod chapter;
pub mod course;
pub mod quiz;
pub mod registration;
pub mod unit;
