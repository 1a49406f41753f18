//! # refsync Testkit
//!
//! Test utilities for the refsync engine.
//!
//! This crate provides:
//! - An in-memory remote service with call counters and fault injection
//! - A fixed key-to-id lookup for referenced resource types
//! - Two sample resource families: categories and product types
//! - A recorder for error and warning callbacks
//! - Property-based test generators using proptest
//! - Tracing bootstrap and ready-made engine harnesses
//!
//! ## Usage
//!
//! ```rust,ignore
//! use refsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn creates_a_category() {
//!     let harness = CategoryHarness::default();
//!     let stats = harness.engine.sync([vec![CategoryDraft::new("c1", "Shoes")]]).await;
//!     assert_eq!(stats.created(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod categories;
pub mod fixtures;
pub mod generators;
pub mod lookup;
pub mod memory;
pub mod product_types;
pub mod recorder;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::categories::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::lookup::*;
    pub use crate::memory::*;
    pub use crate::product_types::*;
    pub use crate::recorder::*;
}

pub use categories::*;
pub use fixtures::*;
pub use generators::*;
pub use lookup::*;
pub use memory::*;
pub use product_types::*;
pub use recorder::*;
