//! HTTP处理器

pub mod appointments;
pub mod cart;
pub mod health;
pub mod orders;
pub mod payments;
