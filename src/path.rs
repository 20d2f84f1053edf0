//! Route path notation and documentation labels.
//!
//! Routes are declared with the colon notation (`/house-rules/:id`, plus an
//! optional trailing catch-all `/*rest`). The router and the OpenAPI document
//! both use the brace notation (`/house-rules/{id}`, `/{*rest}`), so every
//! declared path goes through [`normalize`] before it is installed or
//! documented.

use crate::error::{Error, Result};

/// Join a root prefix and a declared sub-path into the router's pattern syntax.
///
/// A sub-path of `""` or `"/"` maps to the root prefix itself, and a trailing
/// slash is dropped. Parameter order is preserved.
///
/// # Errors
/// Returns [`Error::Config`] when either part is malformed: missing leading
/// slash, empty segment, empty or invalid parameter name, a parameter name
/// used twice, or a catch-all that is not the last segment.
pub fn normalize(root: &str, path: &str) -> Result<String> {
    let mut names = Vec::new();
    let root_pattern = convert(root, &mut names)?;
    let sub_pattern = convert(path, &mut names)?;

    if root_pattern.contains("{*") && !sub_pattern.is_empty() {
        return Err(malformed(root, "catch-all must be the last segment"));
    }

    let mut full = root_pattern + &sub_pattern;
    if full.is_empty() {
        full.push('/');
    }
    Ok(full)
}

fn convert<'p>(path: &'p str, names: &mut Vec<&'p str>) -> Result<String> {
    if path.is_empty() || path == "/" {
        return Ok(String::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(malformed(path, "must start with '/'"));
    };
    let rest = rest.strip_suffix('/').unwrap_or(rest);

    let segments: Vec<&str> = rest.split('/').collect();
    let mut out = String::with_capacity(path.len() + segments.len() * 2);

    for (i, segment) in segments.iter().enumerate() {
        out.push('/');
        if let Some(name) = segment.strip_prefix(':') {
            check_name(path, name, names)?;
            out.push('{');
            out.push_str(name);
            out.push('}');
        } else if let Some(name) = segment.strip_prefix('*') {
            if i + 1 != segments.len() {
                return Err(malformed(path, "catch-all must be the last segment"));
            }
            check_name(path, name, names)?;
            out.push_str("{*");
            out.push_str(name);
            out.push('}');
        } else if segment.is_empty() {
            return Err(malformed(path, "empty path segment"));
        } else if let Some(bad) = segment.chars().find(|c| !is_literal_char(*c)) {
            return Err(malformed(path, &format!("invalid character {bad:?}")));
        } else {
            out.push_str(segment);
        }
    }

    Ok(out)
}

fn check_name<'p>(path: &str, name: &'p str, seen: &mut Vec<&'p str>) -> Result<()> {
    if name.is_empty() {
        return Err(malformed(path, "parameter without a name"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(malformed(path, &format!("invalid parameter name {name:?}")));
    }
    if seen.contains(&name) {
        return Err(malformed(path, &format!("duplicate parameter {name:?}")));
    }
    seen.push(name);
    Ok(())
}

fn is_literal_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')
}

fn malformed(path: &str, reason: &str) -> Error {
    Error::Config(format!("Malformed route path {path:?}: {reason}"))
}

/// Turn a handler identifier into a display title.
///
/// Both `snake_case` and `lowerCamelCase` are split into words:
/// `create_house_rule` and `createHouseRule` both become `Create House Rule`.
/// An empty identifier yields an empty title.
pub fn titleize(identifier: &str) -> String {
    words(identifier)
        .iter()
        .map(|word| capitalize(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Documentation tag for a root prefix: its first literal segment in
/// PascalCase (`/house-rules` becomes `HouseRules`).
pub fn classify(root: &str) -> String {
    root.split('/')
        .find(|s| !s.is_empty() && !s.starts_with(':') && !s.starts_with('*'))
        .map(|segment| words(segment).iter().map(|w| capitalize(w)).collect::<String>())
        .unwrap_or_default()
}

/// Identifier of a function type: the last path segment of its type name.
///
/// Closures have no identifier and yield `""`.
pub fn identifier_of<F>() -> &'static str {
    let full = std::any::type_name::<F>();
    let base = full.split('<').next().unwrap_or(full);
    let last = base.rsplit("::").next().unwrap_or(base);
    if last.starts_with('{') { "" } else { last }
}

fn words(identifier: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in identifier.chars() {
        if matches!(c, '_' | '-' | ' ' | '.') {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
