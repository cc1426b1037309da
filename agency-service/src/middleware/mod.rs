//! HTTP middleware specific to the agency service.

pub mod tenant;

pub use tenant::tenant_router_middleware;
