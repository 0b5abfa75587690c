use std::path::Path;

use anyhow::Context;

/// Read test case names, one per line. Blank lines and lines starting with `#` are skipped.
pub fn read_case_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read case list {}", path.display()))?;
    Ok(parse_case_list(&content))
}

pub fn parse_case_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
