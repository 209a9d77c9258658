/// Hash a sequence of string parts, separating them so `["ab", "c"]` and
/// `["a", "bc"]` produce different digests.
#[must_use]
pub fn blake3_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
