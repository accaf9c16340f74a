//! Single-file local datastore (SQLite) for License/UserLicense/Flags.
//!
//! Grounded on the teacher's model-with-pool-bound-methods shape
//! (`domains/schedules/models/schedule.rs`: `sqlx::query_as` + `fetch_*`
//! bound to a pool argument), swapped from the teacher's `PgPool` to
//! `SqlitePool` per the spec's single-file-store requirement. The three
//! entities and their invariants (one non-FREE License per workspace, seat
//! ceilings, cascade deletes rooted at License) are ported unchanged from
//! the original Go GORM models (`monitor/cli/pkg/db/models.go`).

pub mod models;
pub mod pool;
pub mod repository;

pub use models::{Flags, License, UserLicense};
pub use pool::init_pool;
pub use repository::Store;
