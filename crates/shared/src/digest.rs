//! Content digests behind rule identity.
//!
//! Every rule the compiler writes is identified by the first ten hex digits
//! of an md5 digest over the rule's defining content, and its Suricata `sid`
//! is derived from the same digest so that re-compiling identical intent
//! reproduces the rule byte for byte. The digest is identity, not security.

/// First ten hex digits of the md5 digest of `input`.
pub fn hash10(input: &str) -> String {
    let digest = md5::compute(input.as_bytes());
    format!("{digest:x}")[..10].to_string()
}

/// Decimal `sid` for a rule: the low 24 bits of the md5 digest of `input`.
pub fn sid(input: &str) -> u32 {
    let digest = md5::compute(input.as_bytes());
    let tail = &digest.0[13..16];
    (u32::from(tail[0]) << 16) | (u32::from(tail[1]) << 8) | u32::from(tail[2])
}
