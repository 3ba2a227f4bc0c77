use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub(super) fn load_dotenv_map(app_root: &Path) -> Result<HashMap<String, String>, std::io::Error> {
    let path = app_root.join(".env");
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let raw = fs::read_to_string(path)?;
    Ok(parse_dotenv_content(raw.as_str()))
}

pub(super) fn parse_dotenv_content(raw: &str) -> HashMap<String, String> {
    raw.lines().filter_map(parse_dotenv_line).collect()
}

fn parse_dotenv_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote_value(value.trim())))
}

fn unquote_value(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    match value.split_once(" #") {
        Some((before_comment, _)) => before_comment.trim_end().to_string(),
        None => value.to_string(),
    }
}
