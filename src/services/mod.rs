//! Host services around the fallback transport.
//!
//! - `shared`: the query bridge between HTTP handler threads and the loop,
//!   used by every network stack that serves the status document
//! - `web` feature: Axum status responder and [`DesktopNetwork`], a
//!   [`NetworkStack`](crate::traits::NetworkStack) for running the node
//!   loop on a desktop
//!
//! # Query bridge
//!
//! ```text
//! HTTP handler ──request()──► bounded queue ──► QueryServer::serve_pending
//!      ▲                                               │ (on the loop)
//!      └──────────────── rendered StatusBody ◄──────────┘
//! ```

pub mod shared;

#[cfg(feature = "web")]
pub mod web;

pub use shared::*;

#[cfg(feature = "web")]
pub use web::*;
