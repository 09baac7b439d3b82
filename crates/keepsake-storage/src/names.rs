//! Shared object-name validation for replication backends.

use crate::traits::{ReplicationError, ReplicationResult};

/// Reject names that could address anything other than a single object
/// directly inside the destination.
pub fn validate_object_name(name: &str) -> ReplicationResult<()> {
    if name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.chars().any(char::is_control)
    {
        return Err(ReplicationError::InvalidName(name.to_string()));
    }
    Ok(())
}
