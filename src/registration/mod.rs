//! Service registration.
//!
//! A small composition root: capabilities are keyed by type, each with a
//! constructor and a [`ServiceLifetime`].

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod services;
pub mod syrx;

pub use services::{ServiceCollection, ServiceLifetime, ServiceProvider, ServiceScope};
pub use syrx::SyrxBuilder;
