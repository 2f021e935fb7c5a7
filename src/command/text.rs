/// Normalize statement text before it reaches the driver.
///
/// Surrounding whitespace is trimmed and a single trailing `;` removed, except
/// for PL/SQL blocks (`BEGIN ...` / `DECLARE ...`) where the terminator is part
/// of the block.
#[must_use]
pub fn adjust_command_text(text: &str) -> String {
    let trimmed = text.trim();
    if is_plsql_block(trimmed) {
        return trimmed.to_string();
    }
    trimmed
        .strip_suffix(';')
        .map_or(trimmed, str::trim_end)
        .to_string()
}

fn is_plsql_block(text: &str) -> bool {
    let first_word = text
        .split(|c: char| c.is_whitespace() || c == ';')
        .next()
        .unwrap_or_default();
    first_word.eq_ignore_ascii_case("BEGIN") || first_word.eq_ignore_ascii_case("DECLARE")
}
