//! Bearer credential verification.

pub mod jwt;
