#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod client;
pub mod invoice;
pub mod verify;
pub mod webhook;

pub use client::{MonoClient, MonoError};
