/// Joins `prefix` and a shard-relative entry path into a registry path.
#[must_use]
pub fn join_path(prefix: &str, entry: &str) -> String {
    let mut path = String::with_capacity(prefix.len() + entry.len() + 1);
    path.push_str(prefix);
    path.push('/');
    path.push_str(entry);
    path
}
