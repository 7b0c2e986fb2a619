pub mod assignment;
pub mod attempt;
pub mod drill;
pub mod review;
pub mod user;

pub use assignment::{Assignment, AssignmentStatus};
pub use attempt::{Attempt, DrillResults};
pub use drill::{Drill, DrillContent, DrillRef, DrillType};
pub use review::{ReviewFilter, ReviewStatus};
pub use user::{User, UserRole};
