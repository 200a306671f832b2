//! Cadence appointment engine - integration test support.
//!
//! This crate re-exports the workspace crates to support integration tests
//! that use `cadence::` paths, and provides in-memory implementations of
//! every collaborator port.

#![allow(ambiguous_glob_reexports)]

pub mod adapters;

pub mod component {
    // Re-export core, domain and service modules at the component level
    pub use cadence_core::*;
    pub use cadence_domain::*;
    pub use cadence_service::*;

    // Re-export the domain model and scope algebra under their own names
    pub mod model {
        pub use cadence_domain::model::*;
    }

    pub mod scope {
        pub use cadence_domain::scope::*;
    }

    // Re-export config from core
    pub mod config {
        pub use cadence_core::config::*;
    }

    // The service error type wraps the domain and core ones; make it the
    // unambiguous `component::error`
    pub mod error {
        pub use cadence_service::error::*;
    }
}
