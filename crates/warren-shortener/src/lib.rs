//! URL shortener service facade.
//!
//! Wires a [`UrlStore`](warren_core::UrlStore), a short-id [`Generator`] and
//! a [`DeletionPipeline`](warren_deleter::DeletionPipeline) behind one
//! service that request handlers call with an explicit [`RequestContext`].

pub mod context;
pub mod error;
pub mod generator;
pub mod service;

pub use context::RequestContext;
pub use error::{Result, ShortenerError};
pub use generator::Generator;
pub use service::{Shortened, ShortenerService};
