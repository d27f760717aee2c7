use std::path::{Component, Path};

/// True when `name` can be used as exactly one plain entry inside a folder:
/// a single normal path component, not hidden, portable across platforms.
pub fn is_plain_entry_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    single_normal
        && !name.starts_with('.')
        && !name.ends_with(['.', ' '])
        && !name.chars().any(is_forbidden)
        && !is_reserved_windows_name(stem(name))
}

fn stem(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
