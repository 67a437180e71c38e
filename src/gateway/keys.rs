//! Namespace-to-key derivation.
//!
//! The single point where a caller-supplied namespace maps onto store
//! keys. Lock and state keys differ only by suffix, so they can never
//! collide for the same namespace, and the legacy layout is one policy
//! flag away from the rest of the system.

/// Key holding the chunked state blob for `namespace`.
pub fn state_key(namespace: &str) -> String {
    format!("{}/state", namespace)
}

/// Key holding the lock for `namespace`.
pub fn lock_key(namespace: &str) -> String {
    format!("{}/lock", namespace)
}

/// Key of the pre-chunking layout for `namespace`.
///
/// Older deployments stored state at `{namespace}default`; newer ones
/// inserted a slash. `add_slash` selects between the two.
pub fn legacy_key(namespace: &str, add_slash: bool) -> String {
    if add_slash {
        format!("{}/default", namespace)
    } else {
        format!("{}default", namespace)
    }
}
