//! Class and complementary-activity scheduling: time grid, cached allocations and the
//! pre-write conflict check that keeps a teacher in one place per slot.

pub mod conflict;
pub mod model;
pub mod store;
pub mod time_grid;
pub mod views;

pub use conflict::{ActivityCandidate, Candidate, Conflict, NameIndex};
pub use model::{NewClassAllocation, NewComplementaryAllocation, Semester, Weekday};
pub use store::AllocationStore;
