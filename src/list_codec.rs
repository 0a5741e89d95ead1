//! Semicolon-list encoding, path utilities, and shell quoting.
//!
//! The semicolon-list is the canonical list carrier inside macro strings:
//! items are joined with `;`, a literal `;` inside an item is escaped as
//! `\;`, and empty items are dropped on decode.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use shell_quote::{QuoteRefExt, Sh};

/// Encode a list of strings as a semicolon-list.
#[must_use]
pub fn encode<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| item.as_ref().replace(';', "\\;"))
        .collect::<Vec<_>>()
        .join(";")
}

/// Decode a semicolon-list into its items, dropping empty entries.
#[must_use]
pub fn decode(list: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = list.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&';') => {
                current.push(';');
                chars.next();
            }
            ';' => {
                if !current.is_empty() {
                    items.push(std::mem::take(&mut current));
                }
            }
            other => current.push(other),
        }
    }
    if !current.is_empty() {
        items.push(current);
    }
    items
}

/// Replace a path's extension per §4.6: find the last `.` after the last
/// path separator, strip from there, and append `suffix` (a leading `.` is
/// added if missing). A path with no `.` in its basename simply gains the
/// suffix; an empty `suffix` drops the extension entirely.
#[must_use]
pub fn set_suffix(path: &str, suffix: &str) -> String {
    let search_start = path.rfind(['/', '\\']).map_or(0, |pos| pos + 1);
    let basename = path.get(search_start..).unwrap_or("");
    let stem_len = basename.rfind('.').unwrap_or(basename.len());
    let stem_end = search_start + stem_len;
    let stem = path.get(..stem_end).unwrap_or(path);

    let mut out = stem.to_string();
    if !suffix.is_empty() {
        if !suffix.starts_with('.') {
            out.push('.');
        }
        out.push_str(suffix);
    }
    out
}

/// Directory component of `path`, `"."` when there is none.
#[must_use]
pub fn dirname(path: &str) -> String {
    Utf8Path::new(path)
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .map_or_else(|| ".".to_string(), |p| p.as_str().to_string())
}

/// Basename (final path component) of `path`.
#[must_use]
pub fn basename(path: &str) -> String {
    Utf8Path::new(path)
        .file_name()
        .unwrap_or(path)
        .to_string()
}

/// Expand a leading `~`, make the path absolute against the current
/// directory, and collapse `.`/`..` components.
#[must_use]
pub fn normpath(path: &str) -> Utf8PathBuf {
    let expanded = expand_home(path);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        current_dir_utf8().join(&expanded)
    };
    normalize_components(&absolute)
}

fn expand_home(path: &str) -> Utf8PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with(['/', '\\']) {
            if let Some(home) = home_dir() {
                let trimmed = rest.trim_start_matches(['/', '\\']);
                return home.join(trimmed);
            }
        }
    }
    Utf8PathBuf::from(path)
}

fn home_dir() -> Option<Utf8PathBuf> {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    std::env::var(var).ok().map(Utf8PathBuf::from)
}

fn current_dir_utf8() -> Utf8PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
        .unwrap_or_default()
}

fn normalize_components(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_str()),
        }
    }
    out
}

fn quote_posix(s: &str) -> String {
    let bytes: Vec<u8> = s.quoted(Sh);
    String::from_utf8(bytes).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

fn quote_windows(s: &str) -> String {
    let needs_quotes = s.is_empty() || s.chars().any(char::is_whitespace);
    let escaped: String = s
        .chars()
        .flat_map(|c| if c == '"' { vec!['\\', '"'] } else { vec![c] })
        .collect();
    if needs_quotes {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}

/// Shell-quote a single argument for the current platform: POSIX
/// single-quote escaping everywhere except Windows, which uses
/// double-quotes with `"` escaped as `\"`.
#[must_use]
pub fn quote(s: &str) -> String {
    if cfg!(windows) {
        quote_windows(s)
    } else {
        quote_posix(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn round_trip_drops_empties() {
        let items = vec!["a".to_string(), "b;c".to_string(), String::new(), "d".to_string()];
        let encoded = encode(&items);
        let decoded = decode(&encoded);
        assert_eq!(decoded, vec!["a", "b;c", "d"]);
    }

    #[rstest]
    #[case("a/b/c.txt", "o", "a/b/c.o")]
    #[case("a/b/c.txt", ".o", "a/b/c.o")]
    #[case("name", "o", "name.o")]
    #[case("a/b/c.tar.gz", "", "a/b/c.tar")]
    fn set_suffix_cases(#[case] path: &str, #[case] suffix: &str, #[case] expected: &str) {
        assert_eq!(set_suffix(path, suffix), expected);
    }

    #[test]
    fn quote_posix_wraps_whitespace() {
        if !cfg!(windows) {
            let quoted = quote("a b");
            assert_ne!(quoted, "a b", "quoting must escape the embedded space");
            assert!(quoted.contains('\''), "expected single-quote escaping: {quoted}");
            assert_eq!(quote("plain"), "plain");
        }
    }

    #[test]
    fn quote_windows_escapes_doublequotes_and_wraps_whitespace() {
        assert_eq!(quote_windows("plain"), "plain");
        assert_eq!(quote_windows("a b"), "\"a b\"");
        assert_eq!(quote_windows("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn normpath_collapses_dot_components() {
        let normalized = normpath("a/./b/../c");
        assert!(normalized.is_absolute(), "normpath must absolutize: {normalized}");
        assert!(normalized.as_str().ends_with("a/c") || normalized.as_str().ends_with("a\\c"));
    }

    #[test]
    fn normpath_expands_home() {
        // SAFETY: test-local variable, not shared with other tests.
        unsafe { std::env::set_var(if cfg!(windows) { "USERPROFILE" } else { "HOME" }, "/home/tester") };
        let normalized = normpath("~/project");
        assert_eq!(normalized, Utf8PathBuf::from("/home/tester/project"));
    }
}
