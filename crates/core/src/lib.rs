//! Coordination layer of the Peduli back-office.
//!
//! Pure in-process logic shared by every list screen: the status lifecycle
//! table, the selection store, the bounded-concurrency batch executor and
//! the orchestrator that wires them to the platform API. No HTTP lives here;
//! remote calls go through the traits in [`remote`].

pub mod batch;
pub mod error;
pub mod lifecycle;
pub mod list_view;
pub mod notify;
pub mod orchestrator;
pub mod remote;
pub mod selection;
pub mod types;
