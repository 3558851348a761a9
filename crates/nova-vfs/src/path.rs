use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

pub(crate) fn normalize_local_path(path: &Path) -> PathBuf {
    let mut prefix: Option<OsString> = None;
    let mut has_root = false;
    let mut stack: Vec<OsString> = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix_component) => {
                prefix = Some(normalize_prefix(prefix_component.as_os_str()));
            }
            Component::RootDir => has_root = true,
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(last) = stack.last() {
                    if last != ".." {
                        stack.pop();
                        continue;
                    }
                }

                // `/..` is `/`; relative paths keep leading parent segments.
                if !has_root {
                    stack.push(OsString::from(".."));
                }
            }
            Component::Normal(segment) => stack.push(segment.to_owned()),
        }
    }

    let mut out = PathBuf::new();
    match (prefix, has_root) {
        (Some(mut prefix), true) => {
            prefix.push(std::path::MAIN_SEPARATOR.to_string());
            out.push(prefix);
        }
        (Some(prefix), false) => out.push(prefix),
        (None, true) => out.push(std::path::MAIN_SEPARATOR.to_string()),
        (None, false) => {}
    }
    out.extend(stack);
    out
}

/// Drive letters are case-insensitive on Windows; keep them upper-case so roots compare equal.
fn normalize_prefix(prefix: &std::ffi::OsStr) -> OsString {
    match prefix.to_str() {
        Some(text) => {
            let mut chars: Vec<char> = text.chars().collect();
            if chars.len() == 2 && chars[1] == ':' {
                chars[0] = chars[0].to_ascii_uppercase();
            }
            OsString::from(chars.into_iter().collect::<String>())
        }
        None => prefix.to_owned(),
    }
}
