// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bracketed-paste framing and per-agent soft-newline translation (§4.4).
//!
//! Assistant CLIs distinguish "insert a line break in the composer" from
//! "submit" by the byte sequence following a newline in the input stream.
//! Each agent picks its own soft-newline sequence; the registry translates
//! user-typed newlines into it before writing to the PTY (§4.11).

/// Start token for xterm bracketed paste mode.
pub const BRACKETED_PASTE_START: &[u8] = b"\x1b[200~";
/// End token for xterm bracketed paste mode.
pub const BRACKETED_PASTE_END: &[u8] = b"\x1b[201~";

/// Threshold above which input is framed as a bracketed paste even without
/// an embedded newline.
pub const PASTE_THRESHOLD_CHARS: usize = 1024;

/// The byte sequence a given agent's composer interprets as "insert a line
/// break" rather than "submit".
pub fn soft_newline_for_agent(agent_id: &str) -> &'static [u8] {
    match agent_id.to_lowercase().as_str() {
        "codex" | "opencode" | "terminal" => b"\n",
        // claude, gemini, and any unregistered/unknown agent default to
        // ESC CR, which Ink-based composers treat as a soft break.
        _ => b"\x1b\r",
    }
}

/// Whether `text` should be framed as a bracketed paste: it contains a
/// newline, or it is long enough that keystroke-by-keystroke delivery would
/// be mistaken for rapid typing.
pub fn should_use_bracketed_paste(text: &str) -> bool {
    text.contains('\n') || text.chars().count() > PASTE_THRESHOLD_CHARS
}

/// Wrap `text` with the bracketed-paste start/end tokens.
pub fn format_with_bracketed_paste(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + BRACKETED_PASTE_START.len() + BRACKETED_PASTE_END.len());
    out.extend_from_slice(BRACKETED_PASTE_START);
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(BRACKETED_PASTE_END);
    out
}

/// True only when `data` begins with the start token *and* also contains
/// the end token somewhere after it. Partial framing (a lone start token,
/// or an end token with no matching start) is rejected.
pub fn contains_full_bracketed_paste(data: &[u8]) -> bool {
    if !data.starts_with(BRACKETED_PASTE_START) {
        return false;
    }
    let rest = &data[BRACKETED_PASTE_START.len()..];
    rest.windows(BRACKETED_PASTE_END.len()).any(|w| w == BRACKETED_PASTE_END)
}

/// Translate every bare `\n` in `text` into the agent's soft-newline
/// sequence, then frame the result as a bracketed paste if warranted.
///
/// This is the single entry point the registry's `write` operation (§4.11)
/// uses to turn user-typed text into PTY bytes.
pub fn encode_input(agent_id: &str, text: &str) -> Vec<u8> {
    let soft_newline = soft_newline_for_agent(agent_id);
    let mut translated = Vec::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '\n' {
            translated.extend_from_slice(soft_newline);
        } else {
            let mut buf = [0u8; 4];
            translated.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        }
    }

    if should_use_bracketed_paste(text) {
        let mut framed = Vec::with_capacity(translated.len() + 12);
        framed.extend_from_slice(BRACKETED_PASTE_START);
        framed.extend_from_slice(&translated);
        framed.extend_from_slice(BRACKETED_PASTE_END);
        framed
    } else {
        translated
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
