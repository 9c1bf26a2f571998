//! Wildcard expansion of unquoted words (`*`, `?`, `[...]`).
//!
//! Each path component containing a wildcard is turned into an anchored regular
//! expression and matched against the entries of the directories produced so far.
//! A pattern that matches nothing is passed through unchanged.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

pub fn has_wildcards(word: &str) -> bool {
    word.contains(['*', '?', '['])
}

/// Expand `pattern` into the sorted list of matching paths, or `[pattern]` when
/// nothing matches.
pub fn expand(pattern: &str) -> Vec<String> {
    if !has_wildcards(pattern) {
        return vec![pattern.to_string()];
    }

    let root = if pattern.starts_with('/') {
        PathBuf::from("/")
    } else {
        PathBuf::new()
    };
    let mut candidates = vec![root];

    for component in pattern.split('/').filter(|c| !c.is_empty()) {
        let mut next = Vec::new();
        if !has_wildcards(component) {
            for base in &candidates {
                next.push(base.join(component));
            }
        } else {
            let Some(re) = component_regex(component) else {
                return vec![pattern.to_string()];
            };
            for base in &candidates {
                next.extend(matching_entries(base, component, &re));
            }
        }
        candidates = next;
        if candidates.is_empty() {
            break;
        }
    }

    let mut matches: Vec<String> = candidates
        .into_iter()
        .filter(|path| fs::symlink_metadata(path).is_ok())
        .map(|path| path.to_string_lossy().into_owned())
        .collect();
    if matches.is_empty() {
        return vec![pattern.to_string()];
    }
    matches.sort();
    matches
}

fn matching_entries(base: &Path, component: &str, re: &Regex) -> Vec<PathBuf> {
    let dir = if base.as_os_str().is_empty() {
        Path::new(".")
    } else {
        base
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        // hidden entries only match a pattern that asks for them
        .filter(|name| !name.starts_with('.') || component.starts_with('.'))
        .filter(|name| re.is_match(name))
        .map(|name| base.join(name))
        .collect()
}

/// Translate one glob component into an anchored regex.
fn component_regex(component: &str) -> Option<Regex> {
    let chars: Vec<char> = component.chars().collect();
    let mut re = String::from("^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    re.push('[');
                    let mut j = i + 1;
                    if matches!(chars.get(j), Some('!' | '^')) {
                        re.push('^');
                        j += 1;
                    }
                    for &c in &chars[j..end] {
                        if matches!(c, '\\' | '[' | ']' | '&' | '~') {
                            re.push('\\');
                        }
                        re.push(c);
                    }
                    re.push(']');
                    i = end;
                }
                None => re.push_str(r"\["),
            },
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    re.push('$');
    Regex::new(&re).ok()
}

/// Index of the `]` closing the class opened at `start`, if any.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if matches!(chars.get(j), Some('!' | '^')) {
        j += 1;
    }
    // a `]` right after the opening is a member, not the end
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_unique_temp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "jobshell_glob_{}_{}",
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            File::create(dir.join(name)).expect("touch");
        }
    }

    #[test]
    fn test_word_without_wildcards_is_unchanged() {
        assert_eq!(expand("plain.txt"), vec!["plain.txt"]);
        assert!(!has_wildcards("a-z"));
        assert!(has_wildcards("*.rs"));
    }

    #[test]
    fn test_star_and_question_mark() {
        let dir = make_unique_temp_dir();
        touch(&dir, &["a.txt", "b.txt", "c.log", "ab.txt"]);
        let base = dir.to_string_lossy();

        assert_eq!(
            expand(&format!("{base}/*.txt")),
            vec![
                format!("{base}/a.txt"),
                format!("{base}/ab.txt"),
                format!("{base}/b.txt"),
            ]
        );
        assert_eq!(
            expand(&format!("{base}/?.txt")),
            vec![format!("{base}/a.txt"), format!("{base}/b.txt")]
        );

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_character_classes() {
        let dir = make_unique_temp_dir();
        touch(&dir, &["f1", "f2", "f3", "fx"]);
        let base = dir.to_string_lossy();

        assert_eq!(
            expand(&format!("{base}/f[12]")),
            vec![format!("{base}/f1"), format!("{base}/f2")]
        );
        assert_eq!(
            expand(&format!("{base}/f[!0-9]")),
            vec![format!("{base}/fx")]
        );

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_hidden_files_need_explicit_dot() {
        let dir = make_unique_temp_dir();
        touch(&dir, &[".hidden", "shown"]);
        let base = dir.to_string_lossy();

        assert_eq!(expand(&format!("{base}/*")), vec![format!("{base}/shown")]);
        assert_eq!(
            expand(&format!("{base}/.h*")),
            vec![format!("{base}/.hidden")]
        );

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_wildcard_in_directory_component() {
        let dir = make_unique_temp_dir();
        fs::create_dir_all(dir.join("one")).unwrap();
        fs::create_dir_all(dir.join("two")).unwrap();
        touch(&dir.join("one"), &["data"]);
        touch(&dir.join("two"), &["other"]);
        let base = dir.to_string_lossy();

        assert_eq!(
            expand(&format!("{base}/*/data")),
            vec![format!("{base}/one/data")]
        );

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_no_match_passes_pattern_through() {
        let dir = make_unique_temp_dir();
        let pattern = format!("{}/*.nothing", dir.to_string_lossy());
        assert_eq!(expand(&pattern), vec![pattern.clone()]);
        assert_eq!(expand("[unclosed"), vec!["[unclosed"]);
        let _ = fs::remove_dir_all(dir);
    }
}
