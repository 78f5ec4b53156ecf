//! Glob matching and category-name validation.

/// Prefix marking categories that stay off unless named explicitly.
pub const DISABLED_BY_DEFAULT_PREFIX: &str = "disabled-by-default-";

/// Match `text` against `pattern`, where `*` matches any run of
/// characters (including none) and every other character is literal.
///
/// Matching is case-sensitive and anchored at both ends.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0usize, 0usize);
    // Position of the last `*` seen and the text index it was tried at.
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == b'*' {
            star = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == b'*')
}

/// Whether `name` is usable as a single category component.
///
/// Empty names, names with leading or trailing whitespace, and names
/// containing a double quote are rejected.
pub fn is_valid_component(name: &str) -> bool {
    !name.is_empty() && name.trim() == name && !name.contains('"')
}

/// Whether a component carries the disabled-by-default prefix.
pub fn is_disabled_by_default(name: &str) -> bool {
    name.starts_with(DISABLED_BY_DEFAULT_PREFIX)
}
