//! Recovery parser — extracts identifier/value pairs from device replies.
//!
//! Probe firmware is inconsistent between releases: some builds send real
//! JSON, others drop quotes or braces, use `=` instead of `:`, report
//! errors with the letter `O` instead of `0`, or send bare comma-separated
//! values. The parser runs an ordered cascade of [`Strategy`]s over the
//! reply body and keeps the first non-empty result:
//!
//! | # | Strategy | Accepts |
//! |---|----------|---------|
//! | 1 | [`Structured`](Strategy::Structured) | `{"4102":"24300.0","4104":87}` |
//! | 2 | [`Pattern`](Strategy::Pattern) | `4102:24300.0,4104=87`, `{"4102":"O.00"` |
//! | 3 | [`Loose`](Strategy::Loose) | `4102 24300.0; 4104 -> 87` |
//! | 4 | [`Repair`](Strategy::Repair) | `{name: 'probe', ver: 1.2}` |
//! | 5 | [`Positional`](Strategy::Positional) | `24300.0, O.00, 650` |
//!
//! When every strategy comes back empty the parser fails with
//! [`ParseError::MalformedResponse`]; it never reports an empty success.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ParseError;
use crate::frame::RawMessage;
use crate::reading::RawReading;
use crate::sensor::STANDARD_ORDER;

// A 4-digit id is bounded on both sides: no digit, sign or decimal point
// before it, and no further digit or `.<digit>` fraction after it.
static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[^0-9.\-])([0-9]{4})["']?\s*[:=]\s*["']?(-?[A-Za-z0-9.]+)"#)
        .expect("pair regex is valid")
});

static LOOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|[^0-9.\-])([0-9]{4})(?:[^0-9A-Za-z.]|\.[^0-9A-Za-z])[^0-9A-Za-z]*?(-?[0-9A-Za-z.]+)",
    )
    .expect("loose regex is valid")
});

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9.\-])[0-9]{4}(?:[^0-9.]|\.[^0-9]|\.?$)")
        .expect("identifier regex is valid")
});

static UNQUOTED_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{,]\s*)([A-Za-z0-9_.\-]+)\s*:").expect("key regex is valid")
});

static O_SENTINEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#":\s*"?[Oo](?:\.[0-9]*)?"?\s*([,}])"#).expect("sentinel regex is valid")
});

static BARE_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":\s*(-?[0-9][0-9.]*|[A-Za-z][A-Za-z0-9._\-]*)\s*([,}])")
        .expect("bare value regex is valid")
});

static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*}").expect("trailing comma regex is valid"));

static POSITIONAL_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:-?[0-9]+(?:\.[0-9]+)?|[Oo](?:\.[0-9]*)?|(?i:error))$")
        .expect("token regex is valid")
});

/// Token the repair pass substitutes for `O`-family error values.
pub const ERROR_TOKEN: &str = "ERROR";

/// One extraction strategy of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Decode the `{...}` slice as a JSON object.
    Structured,
    /// `<id> [:=] <value>` pairs anywhere in the text.
    Pattern,
    /// `<id>`, any separator, then a value token.
    Loose,
    /// Rewrite quasi-JSON into JSON, then decode.
    Repair,
    /// Bare values mapped onto a configured identifier order.
    Positional,
}

impl Strategy {
    /// Cascade order.
    pub const ALL: [Self; 5] = [
        Self::Structured,
        Self::Pattern,
        Self::Loose,
        Self::Repair,
        Self::Positional,
    ];

    /// Short name used in logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Pattern => "pattern",
            Self::Loose => "loose",
            Self::Repair => "repair",
            Self::Positional => "positional",
        }
    }

    fn extract(self, body: &str, order: &[String]) -> Option<RawReading> {
        let reading = match self {
            Self::Structured => structured(body),
            Self::Pattern => Some(captured_pairs(&PAIR_RE, body)),
            Self::Loose => Some(captured_pairs(&LOOSE_RE, body)),
            Self::Repair => repair(body),
            Self::Positional => positional(body, order),
        }?;
        (!reading.is_empty()).then_some(reading)
    }
}

/// Reply parser holding the positional fallback configuration.
#[derive(Debug, Clone)]
pub struct RecoveryParser {
    positional_order: Vec<String>,
}

impl Default for RecoveryParser {
    fn default() -> Self {
        Self::new(STANDARD_ORDER.iter().map(|id| (*id).to_owned()).collect())
    }
}

impl RecoveryParser {
    /// Create a parser. `positional_order` lists the identifiers bare
    /// values are assigned to; an empty list disables that strategy.
    #[must_use]
    pub fn new(positional_order: Vec<String>) -> Self {
        Self { positional_order }
    }

    /// Identifier order used by [`Strategy::Positional`].
    #[must_use]
    pub fn positional_order(&self) -> &[String] {
        &self.positional_order
    }

    /// Extract identifier/value pairs from a complete reply.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MalformedResponse`] when no strategy yields a
    /// pair.
    pub fn parse(&self, message: &RawMessage) -> Result<RawReading, ParseError> {
        self.parse_with_strategy(message).map(|(_, reading)| reading)
    }

    /// Like [`parse`](Self::parse), also reporting which strategy won.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MalformedResponse`] when no strategy yields a
    /// pair.
    pub fn parse_with_strategy(
        &self,
        message: &RawMessage,
    ) -> Result<(Strategy, RawReading), ParseError> {
        let body = message.body();

        for strategy in Strategy::ALL {
            match strategy.extract(body, &self.positional_order) {
                Some(reading) => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        pairs = reading.len(),
                        "reply parsed"
                    );
                    return Ok((strategy, reading));
                }
                None => {
                    tracing::trace!(strategy = strategy.name(), "strategy found nothing");
                }
            }
        }

        tracing::warn!(raw = %message.text().escape_debug(), "no strategy could parse reply");
        Err(ParseError::MalformedResponse {
            raw: message.text().to_owned(),
        })
    }
}

fn structured(body: &str) -> Option<RawReading> {
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    decode_object(&body[start..=end])
}

fn decode_object(text: &str) -> Option<RawReading> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text).ok()?;

    let reading = object
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null
                | serde_json::Value::Array(_)
                | serde_json::Value::Object(_) => return None,
            };
            Some((key, value))
        })
        .collect();
    Some(reading)
}

fn captured_pairs(re: &Regex, body: &str) -> RawReading {
    re.captures_iter(body)
        .map(|caps| (caps[1].to_owned(), caps[2].to_owned()))
        .collect()
}

fn repair(body: &str) -> Option<RawReading> {
    let trimmed = body.trim();
    if !(trimmed.starts_with('{') || trimmed.ends_with('}')) {
        return None;
    }

    let mut text = String::with_capacity(trimmed.len() + 2);
    if !trimmed.starts_with('{') {
        text.push('{');
    }
    text.push_str(trimmed);
    if !trimmed.ends_with('}') {
        text.push('}');
    }

    let text = text.replace('\'', "\"");
    let text = UNQUOTED_KEY_RE.replace_all(&text, r#"$1"$2":"#);
    let text = O_SENTINEL_RE.replace_all(&text, format!(r#":"{ERROR_TOKEN}"$1"#));
    let text = BARE_VALUE_RE.replace_all(&text, r#":"$1"$2"#);
    let text = TRAILING_COMMA_RE.replace_all(&text, "}");

    tracing::trace!(repaired = %text, "attempting repaired decode");
    decode_object(&text)
}

fn positional(body: &str, order: &[String]) -> Option<RawReading> {
    if order.is_empty() || IDENTIFIER_RE.is_match(body) {
        return None;
    }

    let tokens: Vec<&str> = body
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '[' | ']' | '{' | '}'))
        .filter(|t| !t.is_empty())
        .collect();

    // longest run of consecutive value tokens
    let mut best: &[&str] = &[];
    let mut start = 0;
    for (idx, token) in tokens.iter().enumerate() {
        if POSITIONAL_TOKEN_RE.is_match(token) {
            let run = &tokens[start..=idx];
            if run.len() > best.len() {
                best = run;
            }
        } else {
            start = idx + 1;
        }
    }

    let reading: RawReading = order
        .iter()
        .zip(best.iter())
        .map(|(id, value)| (id.clone(), *value))
        .collect();
    Some(reading)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(body: &str) -> RawMessage {
        RawMessage::new(format!("{body}\r\nok\r\n"))
    }

    fn parse(body: &str) -> (Strategy, RawReading) {
        RecoveryParser::default()
            .parse_with_strategy(&reply(body))
            .unwrap()
    }

    fn pairs(reading: &RawReading) -> Vec<(&str, &str)> {
        reading.iter().collect()
    }

    // ── Structured ──────────────────────────────────────────────────────

    #[test]
    fn should_decode_valid_json_directly() {
        let body = r#"{"4102":"24300.0","4108":"O.00","4110":"O.0"}"#;
        let (strategy, reading) = parse(body);
        assert_eq!(strategy, Strategy::Structured);

        let direct: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(body).unwrap();
        let expected: RawReading = direct
            .into_iter()
            .map(|(k, v)| (k, v.as_str().unwrap().to_owned()))
            .collect();
        assert_eq!(reading, expected);
    }

    #[test]
    fn should_keep_json_key_order() {
        let (_, reading) = parse(r#"{"4110":"650","4102":"24300.0"}"#);
        assert_eq!(pairs(&reading), [("4110", "650"), ("4102", "24300.0")]);
    }

    #[test]
    fn should_render_json_numbers_as_text() {
        let (strategy, reading) = parse(r#"{"4104":87,"4103":-1500.5,"ok":true,"x":null}"#);
        assert_eq!(strategy, Strategy::Structured);
        assert_eq!(
            pairs(&reading),
            [("4104", "87"), ("4103", "-1500.5"), ("ok", "true")]
        );
    }

    #[test]
    fn should_keep_literal_number_text() {
        let (_, reading) = parse(r#"{"4108":0.00,"4110":6.50}"#);
        assert_eq!(pairs(&reading), [("4108", "0.00"), ("4110", "6.50")]);
    }

    #[test]
    fn should_ignore_noise_around_json_object() {
        let (strategy, reading) = parse("AT+MEA=?\r\n{\"4102\":\"1\"}");
        assert_eq!(strategy, Strategy::Structured);
        assert_eq!(reading.get("4102"), Some("1"));
    }

    #[test]
    fn should_keep_non_identifier_keys_for_query_replies() {
        let (strategy, reading) = parse(r#"{"name":"S2105","ver":"1.0.3"}"#);
        assert_eq!(strategy, Strategy::Structured);
        assert_eq!(reading.get("name"), Some("S2105"));
    }

    // ── Pattern ─────────────────────────────────────────────────────────

    #[test]
    fn should_extract_unquoted_pairs_with_mixed_separators() {
        let (strategy, reading) = parse("4102:24300.0,4104=87");
        assert_eq!(strategy, Strategy::Pattern);
        assert_eq!(pairs(&reading), [("4102", "24300.0"), ("4104", "87")]);
    }

    #[test]
    fn should_extract_pairs_from_json_missing_closing_brace() {
        let (strategy, reading) = parse(r#"{"4102":"24300.0","4108":"O.00""#);
        assert_eq!(strategy, Strategy::Pattern);
        assert_eq!(pairs(&reading), [("4102", "24300.0"), ("4108", "O.00")]);
    }

    #[test]
    fn should_extract_pairs_with_single_quotes_and_spaces() {
        let (_, reading) = parse("'4103' = '-1200' ; 4110 : 650");
        assert_eq!(pairs(&reading), [("4103", "-1200"), ("4110", "650")]);
    }

    #[test]
    fn should_not_split_longer_numbers_into_identifiers() {
        let (_, reading) = parse("4108=2000001,4102=24300");
        assert_eq!(pairs(&reading), [("4108", "2000001"), ("4102", "24300")]);
    }

    // ── Loose ───────────────────────────────────────────────────────────

    #[test]
    fn should_fall_back_to_loose_extraction() {
        let (strategy, reading) = parse("4102 24300.0; 4104 -> 87");
        assert_eq!(strategy, Strategy::Loose);
        assert_eq!(pairs(&reading), [("4102", "24300.0"), ("4104", "87")]);
    }

    #[test]
    fn should_accept_trailing_period_after_loose_identifier() {
        let (strategy, reading) = parse("4104. 87");
        assert_eq!(strategy, Strategy::Loose);
        assert_eq!(reading.get("4104"), Some("87"));
    }

    #[test]
    fn should_keep_sign_in_loose_extraction() {
        let (strategy, reading) = parse("4103 -1500");
        assert_eq!(strategy, Strategy::Loose);
        assert_eq!(reading.get("4103"), Some("-1500"));
    }

    // ── Repair ──────────────────────────────────────────────────────────

    #[test]
    fn should_repair_quasi_json_without_identifiers() {
        let (strategy, reading) = parse("{name: 'probe', ver: 1.2, fault: O.0,}");
        assert_eq!(strategy, Strategy::Repair);
        assert_eq!(
            pairs(&reading),
            [("name", "probe"), ("ver", "1.2"), ("fault", ERROR_TOKEN)]
        );
    }

    #[test]
    fn should_wrap_missing_opening_brace() {
        let (strategy, reading) = parse("status: ready}");
        assert_eq!(strategy, Strategy::Repair);
        assert_eq!(reading.get("status"), Some("ready"));
    }

    #[test]
    fn should_not_repair_text_that_is_not_object_like() {
        let err = RecoveryParser::new(Vec::new())
            .parse(&reply("hello there"))
            .unwrap_err();
        assert!(matches!(err, ParseError::MalformedResponse { .. }));
    }

    // ── Positional ──────────────────────────────────────────────────────

    #[test]
    fn should_assign_bare_values_to_default_order() {
        let (strategy, reading) = parse("24300.0, O.00,87");
        assert_eq!(strategy, Strategy::Positional);
        assert_eq!(
            pairs(&reading),
            [("4102", "24300.0"), ("4103", "O.00"), ("4104", "87")]
        );
    }

    #[test]
    fn should_not_read_decimal_values_as_identifiers() {
        let (strategy, reading) = parse("2430.0,O.00,87");
        assert_eq!(strategy, Strategy::Positional);
        assert_eq!(
            pairs(&reading),
            [("4102", "2430.0"), ("4103", "O.00"), ("4104", "87")]
        );
    }

    #[test]
    fn should_use_configured_positional_order() {
        let parser = RecoveryParser::new(vec!["4102".to_owned(), "4108".to_owned()]);
        let (strategy, reading) = parser
            .parse_with_strategy(&reply("data: 24300.0 O 650"))
            .unwrap();
        assert_eq!(strategy, Strategy::Positional);
        assert_eq!(pairs(&reading), [("4102", "24300.0"), ("4108", "O")]);
    }

    #[test]
    fn should_skip_positional_when_order_is_empty() {
        let parser = RecoveryParser::new(Vec::new());
        assert!(parser.parse(&reply("24300.0,87")).is_err());
    }

    // ── Failure ─────────────────────────────────────────────────────────

    #[test]
    fn should_fail_with_raw_text_when_nothing_matches() {
        let err = RecoveryParser::default()
            .parse(&reply("ERR: busy"))
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::MalformedResponse {
                raw: "ERR: busy\r\nok\r\n".to_owned()
            }
        );
    }

    #[test]
    fn should_fail_on_empty_body() {
        let err = RecoveryParser::default()
            .parse(&RawMessage::new("\r\nok\r\n"))
            .unwrap_err();
        assert!(matches!(err, ParseError::MalformedResponse { .. }));
    }
}
