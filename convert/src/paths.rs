//! Lexical path helpers. LLB paths are always interpreted relative to the
//! root of the filesystem they apply to.

/// Cleans `p` lexically and makes it absolute. The empty path is `/`.
pub(crate) fn clean_path(p: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in p.split('/') {
        match component {
            "" | "." => {}
            // `..` at the root stays at the root
            ".." => {
                parts.pop();
            }
            c => parts.push(c),
        }
    }

    format!("/{}", parts.join("/"))
}

/// Splits a cleaned absolute path into its parent directory and its last
/// component. The root is its own parent, with `/` as base.
pub(crate) fn split_parent(p: &str) -> (&str, &str) {
    match p.rsplit_once('/') {
        Some(("", "")) | None => ("/", "/"),
        Some(("", base)) => ("/", base),
        Some((parent, base)) => (parent, base),
    }
}

/// Whether `p` contains glob metacharacters.
pub(crate) fn has_wildcard(p: &str) -> bool {
    p.contains(['*', '?', '['])
}
