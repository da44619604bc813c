//! Tenant marker embedded at the end of entity keys.

/// Token separating the entity id from the shard name.
pub const DEFAULT_SEPARATOR: &str = "!!";

/// Shard name carried by `key`: the text after the last `separator`.
///
/// Returns `None` when the key carries no separator.
pub fn decode_shard_name<'a>(key: &'a str, separator: &str) -> Option<&'a str> {
    if separator.is_empty() {
        return None;
    }
    key.rfind(separator)
        .map(|pos| &key[pos + separator.len()..])
}

/// Tag an entity id with a shard name.
pub fn encode_key(id: &str, shard: &str, separator: &str) -> String {
    let mut key = String::with_capacity(id.len() + separator.len() + shard.len());
    key.push_str(id);
    key.push_str(separator);
    key.push_str(shard);
    key
}
