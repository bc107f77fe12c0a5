//! Integration tests over the public crate surface.
//!
//! `pipeline` covers the collection flow from raw per-feed batches to a
//! paginated page; `api` drives the full Axum router with stub
//! collectors and asserts the wire envelopes clients depend on.

mod support;

mod api;
mod pipeline;
