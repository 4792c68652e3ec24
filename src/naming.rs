//! Naming conventions for controllers, actions and view files.

use crate::config::MvcConfig;

/// Strip `prefix` and `suffix` from `name`.
///
/// Returns `None` when `name` does not start with `prefix`, or when the
/// first occurrence of `suffix` in the remainder is not at its very end.
/// Empty affixes always match.
pub fn strip_prefix_suffix<'a>(name: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(prefix)?;
    if suffix.is_empty() {
        return Some(rest);
    }
    let pos = rest.len().checked_sub(suffix.len())?;
    match rest.find(suffix) {
        Some(found) if found == pos => Some(&rest[..pos]),
        _ => None,
    }
}

/// Kebab-case a canonical name: `"PostComments"` becomes `"post-comments"`.
///
/// Only ASCII `A`-`Z` are folded.
pub fn pretty_name(name: &str) -> String {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut pretty = String::with_capacity(name.len() + 4);
    pretty.push(first.to_ascii_lowercase());
    for c in chars {
        if c.is_ascii_uppercase() {
            pretty.push('-');
            pretty.push(c.to_ascii_lowercase());
        } else {
            pretty.push(c);
        }
    }
    pretty
}

/// Canonical controller name, `None` if the configured affixes don't match.
pub fn controller_name(full_name: &str, config: &MvcConfig) -> Option<String> {
    strip_prefix_suffix(
        full_name,
        &config.controller.prefix,
        &config.controller.suffix,
    )
    .filter(|name| !name.is_empty())
    .map(str::to_owned)
}

/// Canonical action name. Affixes are removed only where present.
pub fn action_name(full_name: &str, config: &MvcConfig) -> String {
    let name = full_name
        .strip_prefix(config.action.prefix.as_str())
        .unwrap_or(full_name);
    let name = name.strip_suffix(config.action.suffix.as_str()).unwrap_or(name);
    name.to_owned()
}

/// Method-table name of the action declared under `key`.
pub fn action_method_name(key: &str, config: &MvcConfig) -> String {
    format!("{}{}{}", config.action.prefix, key, config.action.suffix)
}

/// Action names must look like exported identifiers.
pub fn is_exported(name: &str) -> bool {
    name.as_bytes().first().is_some_and(u8::is_ascii_uppercase)
}

/// Last path segment of a Rust type name, generics removed.
pub(crate) fn short_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

/// Module path of a Rust type name.
pub(crate) fn module_path(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit_once("::").map(|(module, _)| module).unwrap_or("")
}
