//! Validation and sanitization helpers shared by DTOs and services.
//!
//! Every function here is pure: it either returns the sanitized value or a
//! [`ValidationError`] with a human-readable message. Nothing in this module
//! touches state, so the helpers are safe to call from any task.

use validator::ValidationError;

/// Tokens a participant is allowed to cast. Fibonacci-like estimates plus the
/// "unsure" and "coffee break" specials.
pub const VOTE_DECK: [&str; 9] = ["1", "2", "3", "5", "8", "13", "21", "?", "☕"];

/// Deck members that never make a meaningful numeric suggestion.
pub const SPECIAL_TOKENS: [&str; 2] = ["?", "☕"];

/// Display-name length lower bound, measured after sanitization.
pub const NAME_MIN_LENGTH: usize = 2;
/// Display-name length upper bound.
pub const NAME_MAX_LENGTH: usize = 50;
/// Voting-prompt length lower bound, measured after sanitization.
pub const PROMPT_MIN_LENGTH: usize = 3;
/// Voting-prompt length upper bound.
pub const PROMPT_MAX_LENGTH: usize = 200;
/// Room-code length lower bound.
pub const ROOM_CODE_MIN_LENGTH: usize = 8;
/// Room-code length upper bound (a hyphenated UUID is 36 characters).
pub const ROOM_CODE_MAX_LENGTH: usize = 36;

/// Elements whose entire content is dropped during sanitization.
const BLOCK_ELEMENTS: [&str; 5] = ["script", "style", "iframe", "object", "embed"];

/// Protocol prefixes that never survive sanitization.
const FORBIDDEN_PROTOCOLS: [&str; 3] = ["javascript:", "vbscript:", "data:text/html"];

/// Strip markup, dangerous protocols, and control characters from free text.
///
/// The pass is repeated until a fixpoint is reached, so removing one layer of
/// markup can never uncover a payload that a second sanitization would still
/// change: `sanitize_text(sanitize_text(x)) == sanitize_text(x)` holds for
/// every input.
pub fn sanitize_text(input: &str) -> String {
    let mut text = input.to_owned();
    loop {
        let next = sanitize_pass(&text);
        if next == text {
            return next;
        }
        text = next;
    }
}

fn sanitize_pass(input: &str) -> String {
    let mut text = input.to_owned();

    for element in BLOCK_ELEMENTS {
        strip_element_blocks(&mut text, element);
    }
    strip_event_handler_attributes(&mut text);
    strip_tags(&mut text);
    for protocol in FORBIDDEN_PROTOCOLS {
        strip_needle(&mut text, protocol);
    }
    text.retain(|c| !is_forbidden_control(c));

    text.trim().to_owned()
}

/// Validate a participant display name, returning the sanitized value.
///
/// Accepts letters (ASCII and Latin-1 supplement), digits, whitespace, hyphen
/// and apostrophe, 2 to 50 characters after sanitization.
pub fn validate_name(input: &str) -> Result<String, ValidationError> {
    // Check the raw input: sanitization would strip the very patterns that
    // mark it malicious.
    if contains_suspicious_patterns(input) {
        return Err(error(
            "name_suspicious",
            "name contains potentially malicious content",
        ));
    }

    let name = sanitize_text(input);

    if name.is_empty() {
        return Err(error("name_empty", "name must not be empty"));
    }

    let length = name.chars().count();
    if length < NAME_MIN_LENGTH {
        return Err(error(
            "name_too_short",
            format!("name must have at least {NAME_MIN_LENGTH} characters"),
        ));
    }
    if length > NAME_MAX_LENGTH {
        return Err(error(
            "name_too_long",
            format!("name must have at most {NAME_MAX_LENGTH} characters"),
        ));
    }

    if !name.chars().all(is_allowed_name_char) {
        return Err(error(
            "name_charset",
            "name contains characters that are not allowed",
        ));
    }

    Ok(name)
}

/// Validate a voting prompt / room description, returning the sanitized value.
pub fn validate_prompt(input: &str) -> Result<String, ValidationError> {
    if contains_suspicious_patterns(input) {
        return Err(error(
            "prompt_suspicious",
            "description contains potentially malicious content",
        ));
    }

    let prompt = sanitize_text(input);

    if prompt.is_empty() {
        return Err(error("prompt_empty", "description must not be empty"));
    }

    let length = prompt.chars().count();
    if length < PROMPT_MIN_LENGTH {
        return Err(error(
            "prompt_too_short",
            format!("description must have at least {PROMPT_MIN_LENGTH} characters"),
        ));
    }
    if length > PROMPT_MAX_LENGTH {
        return Err(error(
            "prompt_too_long",
            format!("description must have at most {PROMPT_MAX_LENGTH} characters"),
        ));
    }

    Ok(prompt)
}

/// Validate a shareable room code, returning the trimmed value.
pub fn validate_room_code(input: &str) -> Result<String, ValidationError> {
    let code = input.trim();

    if code.len() < ROOM_CODE_MIN_LENGTH || code.len() > ROOM_CODE_MAX_LENGTH {
        return Err(error(
            "room_code_length",
            format!(
                "room code must have between {ROOM_CODE_MIN_LENGTH} and {ROOM_CODE_MAX_LENGTH} characters"
            ),
        ));
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(error(
            "room_code_charset",
            "room code may only contain letters, digits, and hyphens",
        ));
    }

    Ok(code.to_owned())
}

/// Validate a vote token: `None` (no vote) or a member of [`VOTE_DECK`].
pub fn validate_vote(vote: Option<&str>) -> Result<(), ValidationError> {
    match vote {
        None => Ok(()),
        Some(token) if is_deck_member(token) => Ok(()),
        Some(token) => Err(error(
            "vote_not_in_deck",
            format!("vote `{token}` is not part of the deck"),
        )),
    }
}

/// Validate a final-score string, returning the normalized value.
///
/// Empty is allowed (no score recorded). Otherwise the score must be a deck
/// member or a decimal in `[0, 100]`, normalized to at most two decimal
/// digits with trailing zeros removed.
pub fn validate_final_score(input: &str) -> Result<String, ValidationError> {
    let score = input.trim();

    if score.is_empty() {
        return Ok(String::new());
    }

    if is_deck_member(score) {
        return Ok(score.to_owned());
    }

    match score.parse::<f64>() {
        Ok(value) if value.is_finite() && (0.0..=100.0).contains(&value) => {
            Ok(normalize_decimal(value))
        }
        _ => Err(error(
            "final_score_invalid",
            "final score must be a deck value or a number between 0 and 100",
        )),
    }
}

/// Whether `token` belongs to the fixed vote deck.
pub fn is_deck_member(token: &str) -> bool {
    VOTE_DECK.contains(&token)
}

/// `Validate`-derive adapter for [`validate_name`].
pub fn check_name(value: &str) -> Result<(), ValidationError> {
    validate_name(value).map(|_| ())
}

/// `Validate`-derive adapter for [`validate_prompt`].
pub fn check_prompt(value: &str) -> Result<(), ValidationError> {
    validate_prompt(value).map(|_| ())
}

/// `Validate`-derive adapter for [`validate_final_score`].
pub fn check_final_score(value: &str) -> Result<(), ValidationError> {
    validate_final_score(value).map(|_| ())
}

fn error(code: &'static str, message: impl Into<String>) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into().into());
    err
}

fn is_allowed_name_char(c: char) -> bool {
    // Latin-1 supplement letters, minus the two operators in that block.
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || (('\u{C0}'..='\u{FF}').contains(&c) && c != '×' && c != '÷')
        || c == '-'
        || c == '\''
}

fn is_forbidden_control(c: char) -> bool {
    (c.is_control() || c == '\u{7F}') && c != '\t' && c != '\n' && c != '\r'
}

fn normalize_decimal(value: f64) -> String {
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_owned()
}

/// Detect script injections, inline event handlers, and calls to
/// `eval`/`expression`. Runs against the raw input, before sanitization has
/// stripped the evidence.
fn contains_suspicious_patterns(text: &str) -> bool {
    find_ascii_ci(text, "<script", 0).is_some()
        || FORBIDDEN_PROTOCOLS
            .iter()
            .any(|needle| find_ascii_ci(text, needle, 0).is_some())
        || has_call_pattern(text, "eval")
        || has_call_pattern(text, "expression")
        || has_event_handler_pattern(text)
}

/// Case-insensitive search for an ASCII needle, returning a byte offset.
///
/// The needles used here are pure ASCII, so the returned offset is always a
/// valid char boundary in `haystack`.
fn find_ascii_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let ned = needle.as_bytes();
    if ned.is_empty() || hay.len() < ned.len() || from > hay.len() - ned.len() {
        return None;
    }
    (from..=hay.len() - ned.len()).find(|&i| hay[i..i + ned.len()].eq_ignore_ascii_case(ned))
}

/// Remove `<element ...>...</element>` blocks including their content.
/// Unclosed openings are left for the generic tag stripper.
fn strip_element_blocks(text: &mut String, element: &str) {
    let open = format!("<{element}");
    let close = format!("</{element}>");

    loop {
        let Some(start) = find_ascii_ci(text, &open, 0) else {
            return;
        };
        match find_ascii_ci(text, &close, start + open.len()) {
            Some(end) => text.replace_range(start..end + close.len(), ""),
            None => return,
        }
    }
}

/// Remove quoted inline event-handler attributes (`onclick="..."` and the
/// like) even when they appear outside of a tag.
fn strip_event_handler_attributes(text: &mut String) {
    let mut search_from = 0;
    while let Some(start) = find_ascii_ci(text, "on", search_from) {
        match event_handler_end(&text[start..]) {
            Some(len) => {
                text.replace_range(start..start + len, "");
                search_from = start;
            }
            None => search_from = start + 1,
        }
    }
}

/// Length of an `on<word> = "<value>"` pattern at the start of `text`, if any.
fn event_handler_end(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 2; // past "on"

    let word_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    if i == word_start {
        return None;
    }

    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b'=' {
        return None;
    }
    i += 1;

    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() || (bytes[i] != b'"' && bytes[i] != b'\'') {
        return None;
    }
    let quote = bytes[i];
    i += 1;

    while i < bytes.len() && bytes[i] != quote {
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }

    Some(i + 1)
}

/// Remove every remaining `<...>` tag, keeping the inner text of elements.
fn strip_tags(text: &mut String) {
    while let Some(start) = text.find('<') {
        match text[start..].find('>') {
            Some(offset) => text.replace_range(start..start + offset + 1, ""),
            None => return,
        }
    }
}

/// Repeatedly remove a case-insensitive needle until none remains.
fn strip_needle(text: &mut String, needle: &str) {
    while let Some(start) = find_ascii_ci(text, needle, 0) {
        text.replace_range(start..start + needle.len(), "");
    }
}

/// Detect `name (` with optional whitespace, e.g. `eval (1)`.
fn has_call_pattern(text: &str, name: &str) -> bool {
    let mut search_from = 0;
    while let Some(start) = find_ascii_ci(text, name, search_from) {
        let bytes = text.as_bytes();
        let mut i = start + name.len();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'(' {
            return true;
        }
        search_from = start + 1;
    }
    false
}

/// Detect `on<word> =` regardless of quoting.
fn has_event_handler_pattern(text: &str) -> bool {
    let mut search_from = 0;
    while let Some(start) = find_ascii_ci(text, "on", search_from) {
        let bytes = text.as_bytes();
        let mut i = start + 2;
        let word_start = i;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
            i += 1;
        }
        if i > word_start {
            let mut j = i;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b'=' {
                return true;
            }
        }
        search_from = start + 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert_eq!(validate_name("Alice").unwrap(), "Alice");
        assert_eq!(validate_name("  José da Silva  ").unwrap(), "José da Silva");
        assert_eq!(validate_name("O'Brien-42").unwrap(), "O'Brien-42");
    }

    #[test]
    fn rejects_short_long_and_forbidden_names() {
        assert!(validate_name("A").is_err());
        assert!(validate_name(&"x".repeat(51)).is_err());
        assert!(validate_name("alice@example.com").is_err());
        assert!(validate_name("").is_err());
        // Latin-1 operators are not letters.
        assert!(validate_name("Ann × Bob").is_err());
        assert!(validate_name("Ann ÷ Bob").is_err());
    }

    #[test]
    fn rejects_injection_attempts_in_names() {
        assert!(validate_name("<script>alert(1)</script>").is_err());
        assert!(validate_name("javascript:alert(1)").is_err());
        // Quoted handlers are caught on the raw input, before sanitization
        // strips them.
        assert!(validate_name("x onclick=\"steal()\" y").is_err());
    }

    #[test]
    fn rejects_injection_attempts_in_prompts() {
        assert!(validate_prompt("Story onload=\"x()\" 42").is_err());
        assert!(validate_prompt("javascript:alert(1)").is_err());
        assert!(validate_prompt("estimate eval (cost)").is_err());
    }

    #[test]
    fn sanitize_strips_script_blocks_and_tags() {
        assert_eq!(
            sanitize_text("hello <script>alert('x')</script>world"),
            "hello world"
        );
        assert_eq!(sanitize_text("<b>bold</b> text"), "bold text");
        assert_eq!(sanitize_text("<ScRiPt>x</sCrIpT>ok"), "ok");
    }

    #[test]
    fn sanitize_strips_protocols_and_controls() {
        assert_eq!(sanitize_text("javascript:alert(1)"), "alert(1)");
        assert_eq!(sanitize_text("a\u{0}b\u{7F}c"), "abc");
        assert_eq!(
            sanitize_text("keep\ttabs\nand lines"),
            "keep\ttabs\nand lines"
        );
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "plain text",
            "<script>alert(1)</script>rest",
            "<scr<b>ipt>alert(1)</script>",
            "javajavascript:script:alert(1)",
            "story <i>42</i> onload = 'x'",
        ];
        for input in inputs {
            let once = sanitize_text(input);
            assert_eq!(sanitize_text(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn prompts_enforce_length_after_sanitization() {
        assert_eq!(validate_prompt("Story 42").unwrap(), "Story 42");
        assert!(validate_prompt("<b>ab</b>").is_err()); // "ab" is too short
        assert!(validate_prompt(&"p".repeat(201)).is_err());
    }

    #[test]
    fn room_codes_must_match_charset_and_length() {
        assert_eq!(
            validate_room_code(" 1c0e7a52-9f13-4d6c-8d8e-0123456789ab ").unwrap(),
            "1c0e7a52-9f13-4d6c-8d8e-0123456789ab"
        );
        assert!(validate_room_code("short").is_err());
        assert!(validate_room_code("has spaces in it").is_err());
        assert!(validate_room_code(&"a".repeat(37)).is_err());
    }

    #[test]
    fn votes_must_come_from_the_deck() {
        assert!(validate_vote(None).is_ok());
        for token in VOTE_DECK {
            assert!(validate_vote(Some(token)).is_ok());
        }
        assert!(validate_vote(Some("4")).is_err());
        assert!(validate_vote(Some("fifty")).is_err());
    }

    #[test]
    fn final_scores_accept_deck_values_and_bounded_decimals() {
        assert_eq!(validate_final_score("").unwrap(), "");
        assert_eq!(validate_final_score("  ").unwrap(), "");
        assert_eq!(validate_final_score("13").unwrap(), "13");
        assert_eq!(validate_final_score("☕").unwrap(), "☕");
        assert_eq!(validate_final_score("42.5").unwrap(), "42.5");
        assert_eq!(validate_final_score("42.567").unwrap(), "42.57");
        assert_eq!(validate_final_score("100.00").unwrap(), "100");
        assert!(validate_final_score("101").is_err());
        assert!(validate_final_score("-1").is_err());
        assert!(validate_final_score("NaN").is_err());
        assert!(validate_final_score("abc").is_err());
    }
}
