//! Reqwest-backed implementation of [`wayfare_core::CarrierGateway`].

pub mod client;
pub mod types;

pub use client::{CarrierAuth, ClientBuildError, HttpCarrierGateway};
