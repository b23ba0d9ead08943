//! Derives the four OS object names used by a named queue from a single
//! user-provided name.

use crate::error::{QueueError, Result};

pub const SEM_PRODUCER_PREFIX: &str = "_MSG_Q_SEM_P_";
pub const SEM_CONSUMER_PREFIX: &str = "_MSG_Q_SEM_C_";
pub const MUTEX_PREFIX: &str = "_MSG_Q_MUTEX_";
pub const SHMEM_PREFIX: &str = "_MSG_Q_SHMEM_";

/// Maximum length, in bytes, of any of the four prefixes above.
pub const MAX_PREFIX_LEN: usize = 16;

/// The four derived OS object names for a named queue.
#[derive(Debug, Clone)]
pub struct MangledNames {
    pub sem_producer: String,
    pub sem_consumer: String,
    pub mutex: String,
    pub shmem: String,
}

/// Derive the four OS object names from a user-provided queue name.
///
/// Fails with `InvalidArg` when `name` is empty or the mangled name
/// would be unreasonably long.
pub fn mangle(name: &str) -> Result<MangledNames> {
    if name.is_empty() {
        return Err(QueueError::InvalidArg("queue name must not be empty".into()));
    }
    // Bound total length generously but finitely; real OS name limits
    // (e.g. PSHMNAMLEN on most platforms) are far smaller than this,
    // but the exact cap is a host concern. MAX_PREFIX_LEN is the
    // longest tag we prepend.
    const MAX_NAME_LEN: usize = 200;
    if name.len() + MAX_PREFIX_LEN > MAX_NAME_LEN {
        return Err(QueueError::InvalidArg(format!(
            "queue name '{name}' too long: {} bytes exceeds the {} byte bound",
            name.len(),
            MAX_NAME_LEN - MAX_PREFIX_LEN
        )));
    }

    Ok(MangledNames {
        sem_producer: format!("{SEM_PRODUCER_PREFIX}{name}"),
        sem_consumer: format!("{SEM_CONSUMER_PREFIX}{name}"),
        mutex: format!("{MUTEX_PREFIX}{name}"),
        shmem: format!("{SHMEM_PREFIX}{name}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_four_distinct_names() {
        let names = mangle("orders").unwrap();
        assert_eq!(names.sem_producer, "_MSG_Q_SEM_P_orders");
        assert_eq!(names.sem_consumer, "_MSG_Q_SEM_C_orders");
        assert_eq!(names.mutex, "_MSG_Q_MUTEX_orders");
        assert_eq!(names.shmem, "_MSG_Q_SHMEM_orders");
    }

    #[test]
    fn rejects_empty_name() {
        assert!(mangle("").is_err());
    }

    #[test]
    fn rejects_excessive_length() {
        let long_name = "x".repeat(250);
        assert!(mangle(&long_name).is_err());
    }

    #[test]
    fn accepts_name_at_the_boundary() {
        let name = "x".repeat(200 - MAX_PREFIX_LEN);
        assert!(mangle(&name).is_ok());
    }
}
