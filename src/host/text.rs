//! Chat text helpers: Quake color codes and player name cleanup.

/// Clan tag stripped from player names.
const CLAN_TAG: &str = "]v[";

/// ANSI escapes for the eight Quake color codes `^0`..`^7`.
const ANSI_COLORS: [&str; 8] = [
    "\u{1b}[30m", // black
    "\u{1b}[31m", // red
    "\u{1b}[32m", // green
    "\u{1b}[33m", // yellow
    "\u{1b}[34m", // blue
    "\u{1b}[36m", // cyan
    "\u{1b}[35m", // magenta
    "\u{1b}[37m", // white
];

const ANSI_RESET: &str = "\u{1b}[0m";

/// Remove `^N` color codes.
pub fn strip_colors(text: &str) -> String {
    rewrite_colors(text, |_| "")
}

/// Translate `^N` color codes into ANSI escapes, resetting at the end.
pub fn to_ansi(text: &str) -> String {
    let mut out = rewrite_colors(text, |digit| {
        ANSI_COLORS.get(digit).copied().unwrap_or(ANSI_RESET)
    });
    out.push_str(ANSI_RESET);
    out
}

fn rewrite_colors(text: &str, replace: impl Fn(usize) -> &'static str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '^' {
            if let Some(digit) = chars.peek().and_then(|n| n.to_digit(10)) {
                chars.next();
                out.push_str(replace(digit as usize));
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Normalise a player name for display in tables.
///
/// Drops color codes, the clan tag together with the punctuation around it,
/// and leading/trailing non-word characters, then lower-cases.
pub fn clean_name(name: &str) -> String {
    let mut s = strip_colors(name);

    while let Some(pos) = s.find(CLAN_TAG) {
        let start = s[..pos]
            .char_indices()
            .rev()
            .take_while(|(_, c)| !is_word(*c))
            .last()
            .map(|(i, _)| i)
            .unwrap_or(pos);
        let after = pos + CLAN_TAG.len();
        let end = s[after..]
            .char_indices()
            .find(|(_, c)| is_word(*c))
            .map(|(i, _)| after + i)
            .unwrap_or(s.len());
        s.replace_range(start..end, "");
    }

    s.trim_matches(|c: char| !is_word(c)).to_lowercase()
}
