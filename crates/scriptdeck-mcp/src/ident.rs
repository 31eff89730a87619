//! Tool identifiers
//!
//! Script names are free-form; MCP tool names here are restricted to
//! `[a-z0-9_-]+`. Names are sanitized first, then made unique within a
//! registration pass and against the tools already registered.

use std::collections::HashSet;

/// Identifier used when sanitizing leaves nothing behind.
pub const FALLBACK_IDENTIFIER: &str = "script";

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
}

/// Map an arbitrary string to a legal, non-empty tool identifier.
///
/// Lower-cases, collapses every run of disallowed characters into a single
/// `_`, then trims `_` from both ends.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_run = false;

    for c in raw.chars().flat_map(char::to_lowercase) {
        if is_identifier_char(c) {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_IDENTIFIER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Return `base`, or the first of `base_2`, `base_3`, ... that is in neither set.
///
/// The caller must add the returned identifier to `used_in_pass` before
/// resolving the next one.
pub fn resolve_unique(base: &str, used_in_pass: &HashSet<String>, preexisting: &HashSet<String>) -> String {
    let taken = |candidate: &str| used_in_pass.contains(candidate) || preexisting.contains(candidate);

    if !taken(base) {
        return base.to_string();
    }

    let mut counter: u64 = 2;
    loop {
        let candidate = format!("{}_{}", base, counter);
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
