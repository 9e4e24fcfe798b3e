//! Case conversion for collection slugs and method names
//!
//! Collections are addressed by the kebab-case form of their name and custom
//! methods may be written either way on the wire (`countRetired` and
//! `count-retired` resolve to the same method).

/// Convert a name to kebab-case
///
/// Word boundaries are lower-to-upper transitions, the last capital of an
/// acronym followed by a lowercase letter, and any `_`, `-` or space.
pub fn kebab_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if matches!(c, '_' | '-' | ' ') {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            continue;
        }

        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary && !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Convert a name to lowerCamelCase
pub fn camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, word) in kebab_case(s).split('-').filter(|w| !w.is_empty()).enumerate() {
        if i == 0 {
            out.push_str(word);
            continue;
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
