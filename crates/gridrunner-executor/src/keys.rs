//! Expands `${KEY_*}` tokens in `sendKeys` values to WebDriver key constants.
//!
//! Token names follow Selenium IDE's own `KEY_*` vocabulary; each maps to a
//! `fantoccini::key::Key` variant, which in turn dereferences to the
//! single-character WebDriver private-use-area encoding.

use fantoccini::key::Key;

fn lookup(name: &str) -> Option<Key> {
    Some(match name {
        "KEY_NULL" => Key::Null,
        "KEY_CANCEL" => Key::Cancel,
        "KEY_HELP" => Key::Help,
        "KEY_BACKSPACE" => Key::Backspace,
        "KEY_TAB" => Key::Tab,
        "KEY_CLEAR" => Key::Clear,
        "KEY_RETURN" => Key::Return,
        "KEY_ENTER" => Key::Enter,
        "KEY_SHIFT" => Key::Shift,
        "KEY_CONTROL" => Key::Control,
        "KEY_ALT" => Key::Alt,
        "KEY_PAUSE" => Key::Pause,
        "KEY_ESCAPE" => Key::Escape,
        "KEY_SPACE" => Key::Space,
        "KEY_PAGE_UP" => Key::PageUp,
        "KEY_PAGE_DOWN" => Key::PageDown,
        "KEY_END" => Key::End,
        "KEY_HOME" => Key::Home,
        "KEY_LEFT" | "KEY_ARROW_LEFT" => Key::Left,
        "KEY_UP" | "KEY_ARROW_UP" => Key::Up,
        "KEY_RIGHT" | "KEY_ARROW_RIGHT" => Key::Right,
        "KEY_DOWN" | "KEY_ARROW_DOWN" => Key::Down,
        "KEY_INSERT" => Key::Insert,
        "KEY_DELETE" => Key::Delete,
        "KEY_SEMICOLON" => Key::Semicolon,
        "KEY_EQUALS" => Key::Equals,
        "KEY_NUMPAD0" => Key::NumPad0,
        "KEY_NUMPAD1" => Key::NumPad1,
        "KEY_NUMPAD2" => Key::NumPad2,
        "KEY_NUMPAD3" => Key::NumPad3,
        "KEY_NUMPAD4" => Key::NumPad4,
        "KEY_NUMPAD5" => Key::NumPad5,
        "KEY_NUMPAD6" => Key::NumPad6,
        "KEY_NUMPAD7" => Key::NumPad7,
        "KEY_NUMPAD8" => Key::NumPad8,
        "KEY_NUMPAD9" => Key::NumPad9,
        "KEY_MULTIPLY" => Key::Multiply,
        "KEY_ADD" => Key::Add,
        "KEY_SEPARATOR" => Key::Separator,
        "KEY_SUBTRACT" => Key::Subtract,
        "KEY_DECIMAL" => Key::Decimal,
        "KEY_DIVIDE" => Key::Divide,
        "KEY_F1" => Key::F1,
        "KEY_F2" => Key::F2,
        "KEY_F3" => Key::F3,
        "KEY_F4" => Key::F4,
        "KEY_F5" => Key::F5,
        "KEY_F6" => Key::F6,
        "KEY_F7" => Key::F7,
        "KEY_F8" => Key::F8,
        "KEY_F9" => Key::F9,
        "KEY_F10" => Key::F10,
        "KEY_F11" => Key::F11,
        "KEY_F12" => Key::F12,
        "KEY_META" => Key::Meta,
        "KEY_COMMAND" => Key::Command,
        _ => return None,
    })
}

/// Expands every `${KEY_*}` token in `value`. An unrecognized token name is
/// left untouched verbatim — Selenium IDE scripts occasionally embed literal
/// `${...}` text that isn't a key token, and this keeps that pass-through.
pub fn expand(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            out.push_str(rest);
            rest = "";
            break;
        };
        let end = start + end;
        out.push_str(&rest[..start]);
        let token = &rest[start + 2..end];
        match lookup(token) {
            Some(key) => out.push_str(&key),
            None => out.push_str(&rest[start..=end]),
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_a_known_key_token() {
        let expanded = expand("${KEY_ENTER}");
        assert_eq!(expanded, "\u{e007}");
    }

    #[test]
    fn leaves_unknown_tokens_untouched() {
        assert_eq!(expand("${KEY_NOT_A_KEY}"), "${KEY_NOT_A_KEY}");
    }

    #[test]
    fn expands_tokens_mixed_with_literal_text() {
        assert_eq!(expand("hello${KEY_TAB}world"), "hello\u{e004}world");
    }

    #[test]
    fn text_without_tokens_is_unchanged() {
        assert_eq!(expand("plain text"), "plain text");
    }
}
