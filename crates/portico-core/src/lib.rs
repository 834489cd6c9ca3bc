//! # portico-core
//!
//! Core types and error types for Portico.
//!
//! This crate provides the foundational types shared across all Portico crates:
//! - Entity structs for the portal's tables (users, organizations, roles, settings)
//! - The user role enum that route guards and policies reason about
//! - The authenticated session handed out by the backend
//! - Local input validation mirroring the portal's form rules
//! - Cross-cutting error types

pub mod entities;
pub mod enums;
pub mod errors;
pub mod identity;
pub mod validation;
