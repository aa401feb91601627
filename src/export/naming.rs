//! Output-name policy for account directories and conversation documents.
//!
//! Candidates are tried in order (display name first, stable id as the
//! fallback); the first one that sanitizes to a usable file name wins, with
//! a numeric suffix loop resolving collisions against names already handed
//! out this pass.

use std::collections::HashSet;

/// Characters that cannot appear in a file name on the supported platforms.
const INVALID_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Strip invalid characters and surrounding separators from a candidate.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String =
        name.chars().filter(|c| !INVALID_CHARS.contains(c) && !c.is_control()).collect();
    cleaned.trim().trim_matches('.').to_string()
}

/// Pick an output name from `candidates`, updating `used` with the choice.
///
/// Pure with respect to the filesystem: collisions are decided only against
/// the `used` set. Returns `None` when no candidate survives sanitization.
pub fn choose_output_name(candidates: &[&str], used: &mut HashSet<String>) -> Option<String> {
    for candidate in candidates {
        let base = sanitize_name(candidate);
        if base.is_empty() {
            continue;
        }
        let chosen = if used.contains(&base) {
            let mut suffix = 2usize;
            loop {
                let attempt = format!("{base}_{suffix}");
                if !used.contains(&attempt) {
                    break attempt;
                }
                suffix += 1;
            }
        } else {
            base
        };
        used.insert(chosen.clone());
        return Some(chosen);
    }
    None
}
