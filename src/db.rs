//! Row-level queries. Every function takes a plain connection so callers
//! decide whether it runs inside a transaction.

pub mod campaign;
pub mod message;
pub mod user;
