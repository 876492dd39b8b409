// Entity Models
//
// Registry side: buckets, reference rows, terminal entries.
// Sheet side: rows with their monotonic status and appended output.

pub mod organization;
pub mod row;

pub use organization::{Bucket, ReferenceEntry, ReferenceRow};
pub use row::{RowOutput, RowRecord, RowStatus, SourceRef, Tier};
