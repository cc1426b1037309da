//! Business services: membership resolution, the activity feed, and metrics.

pub mod activity;
pub mod metrics;
pub mod resolver;

pub use activity::{ActivityError, ActivityLog};
pub use metrics::{get_metrics, init_metrics};
pub use resolver::{MembershipService, ResolveError};
