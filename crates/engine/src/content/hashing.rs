use sha2::{Digest, Sha256};

/// Hash of `(normalized relative path, bytes)` pairs; order sensitive.
pub(crate) fn hash_catalog_sources<'a>(sources: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> String {
    let mut hasher = Sha256::new();
    for (normalized_rel, bytes) in sources {
        hasher.update(normalized_rel.as_bytes());
        hasher.update([0u8]);
        hasher.update(bytes);
    }
    to_hex_lower(&hasher.finalize())
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    to_hex_lower(&Sha256::digest(bytes))
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
