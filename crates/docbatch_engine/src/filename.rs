use std::sync::OnceLock;

use docbatch_core::is_plain_entry_name;
use regex::Regex;

fn disposition_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)filename\s*=\s*"([^"]+)""#).expect("static regex"))
}

/// File name announced by a `Content-Disposition` header, if present and usable
/// as a plain file name inside the group folder.
pub fn disposition_filename(header: &str) -> Option<String> {
    let name = disposition_regex().captures(header)?.get(1)?.as_str().trim();
    is_plain_entry_name(name).then(|| name.to_string())
}

/// `{item_id}.{extension}`, used when the response names no file.
pub fn fallback_filename(item_id: &str, extension: &str) -> String {
    format!("{item_id}.{extension}")
}
