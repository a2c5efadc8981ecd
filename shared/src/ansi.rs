//! In-band colour markup.
//!
//! Text sent to players carries two-character tokens that are expanded to
//! ANSI escapes right before it hits the socket:
//!
//! - `&x` normal foreground, `&X` bold foreground
//! - `^x` background
//! - `}x` blinking foreground
//! - `&d` reset, `&&` / `^^` / `}}` literal sigils
//!
//! Colour letters: `x` black, `r` red, `g` green, `y` yellow, `b` blue,
//! `p` purple, `c` cyan, `w` white.

const ESC: &str = "\x1b[";

/// Escape sequence that resets all attributes
pub const RESET: &str = "\x1b[0m";

/// Escape sequence that clears the screen
pub const CLEAR: &str = "\x1b[2J";

fn color_code(letter: char) -> Option<u8> {
    let code = match letter.to_ascii_lowercase() {
        'x' => 0,
        'r' => 1,
        'g' => 2,
        'y' => 3,
        'b' => 4,
        'p' => 5,
        'c' => 6,
        'w' => 7,
        _ => return None,
    };
    Some(code)
}

fn is_sigil(c: char) -> bool {
    matches!(c, '&' | '^' | '}')
}

/// Expand a sigil + letter pair. `None` means the pair is not a token.
fn expand_token(sigil: char, letter: char) -> Option<String> {
    if letter == sigil {
        return Some(sigil.to_string());
    }
    if sigil == '&' && letter == 'd' {
        return Some(RESET.to_string());
    }
    let code = color_code(letter)?;
    let bold = letter.is_ascii_uppercase();
    let seq = match (sigil, bold) {
        ('&', false) => format!("{}0;{}m", ESC, 30 + code),
        ('&', true) => format!("{}1;{}m", ESC, 30 + code),
        ('^', false) => format!("{}{}m", ESC, 40 + code),
        ('^', true) => format!("{}1;{}m", ESC, 40 + code),
        ('}', false) => format!("{}5m{}{}m", ESC, ESC, 30 + code),
        ('}', true) => format!("{}5m{}1;{}m", ESC, ESC, 30 + code),
        _ => return None,
    };
    Some(seq)
}

fn rewrite(input: &str, keep_color: bool) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if !is_sigil(c) {
            out.push(c);
            continue;
        }
        let Some(&next) = chars.peek() else {
            out.push(c);
            break;
        };
        match expand_token(c, next) {
            Some(seq) => {
                chars.next();
                if next == c {
                    out.push(c);
                } else if keep_color {
                    out.push_str(&seq);
                }
            }
            None => out.push(c),
        }
    }
    out
}

/// Expand all colour tokens into ANSI escapes.
pub fn colorize(input: &str) -> String {
    rewrite(input, true)
}

/// Strip all colour tokens, leaving plain text.
pub fn decolorize(input: &str) -> String {
    rewrite(input, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colorize_foreground() {
        assert_eq!(colorize("&rhi&d"), "\x1b[0;31mhi\x1b[0m");
        assert_eq!(colorize("&Whi"), "\x1b[1;37mhi");
    }

    #[test]
    fn test_colorize_background_and_blink() {
        assert_eq!(colorize("^b"), "\x1b[44m");
        assert_eq!(colorize("}R"), "\x1b[5m\x1b[1;31m");
    }

    #[test]
    fn test_literal_sigils() {
        assert_eq!(colorize("a && b"), "a & b");
        assert_eq!(decolorize("50^^2"), "50^2");
    }

    #[test]
    fn test_non_tokens_pass_through() {
        assert_eq!(colorize("R&D dept &"), "R&D dept &");
        assert_eq!(colorize("&q"), "&q");
    }

    #[test]
    fn test_decolorize() {
        assert_eq!(decolorize("&YHello &Wworld&d!"), "Hello world!");
    }
}
