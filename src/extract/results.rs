//! Result-string parsing.
//!
//! A boat's series is usually written as one cell of dash-joined race
//! scores, e.g. `"1-3-DNF-"` or `"2-(14)-5/OCS-"`. Each token is decoded
//! independently so that one bad token never costs the rest of the row.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::RaceOutcome;

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)").expect("valid regex"));
static LEADING_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)").expect("valid regex"));

/// Non-numeric race outcome codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonFinish {
    Dnf,
    Dns,
    Dnc,
}

impl NonFinish {
    /// Detect a code in `text`, checking DNF, DNS, then DNC
    pub fn detect(text: &str) -> Option<Self> {
        let upper = text.to_uppercase();
        if upper.contains("DNF") {
            Some(NonFinish::Dnf)
        } else if upper.contains("DNS") {
            Some(NonFinish::Dns)
        } else if upper.contains("DNC") {
            Some(NonFinish::Dnc)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NonFinish::Dnf => "DNF",
            NonFinish::Dns => "DNS",
            NonFinish::Dnc => "DNC",
        }
    }

    /// Flags in `(dnf, dns, dnc)` order
    pub fn flags(code: Option<Self>) -> (bool, bool, bool) {
        (
            code == Some(NonFinish::Dnf),
            code == Some(NonFinish::Dns),
            code == Some(NonFinish::Dnc),
        )
    }
}

/// Outcomes decoded from one results cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResults {
    pub outcomes: Vec<RaceOutcome>,
    /// One message per token that failed to parse
    pub errors: Vec<String>,
}

impl ParsedResults {
    /// Highest race index seen, counting skipped tokens
    pub fn race_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.race_index).max().unwrap_or(0)
    }
}

/// Decode a dash-delimited results string
pub fn parse_results(text: &str) -> ParsedResults {
    let mut parsed = ParsedResults::default();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return parsed;
    }

    let mut tokens: Vec<&str> = trimmed.split('-').collect();
    if tokens.last().is_some_and(|t| t.trim().is_empty()) {
        tokens.pop();
    }

    for (i, token) in tokens.iter().enumerate() {
        let race_index = i + 1;
        match parse_token(token, race_index) {
            Ok(outcome) => parsed.outcomes.push(outcome),
            Err(message) => parsed.errors.push(message),
        }
    }

    parsed
}

fn parse_token(token: &str, race_index: usize) -> Result<RaceOutcome, String> {
    let token = token.trim();
    if token.is_empty() {
        return Err(format!("race {}: empty score", race_index));
    }

    let (inner, discarded) = strip_discard_marks(token);

    if let Some(code) = NonFinish::detect(inner) {
        let (dnf, dns, dnc) = NonFinish::flags(Some(code));
        return Ok(RaceOutcome {
            race_index,
            points: None,
            dnf,
            dns,
            dnc,
            discarded,
        });
    }

    // Compound "score/annotation": the left operand is the score
    let score = inner.split('/').next().unwrap_or(inner).trim();
    match score.parse::<f64>() {
        Ok(points) if points.is_finite() && points >= 0.0 => Ok(RaceOutcome {
            discarded,
            ..RaceOutcome::scored(race_index, points)
        }),
        _ => Err(format!("race {}: invalid score {:?}", race_index, token)),
    }
}

/// `(12)` and `[12]` mark a dropped score
fn strip_discard_marks(token: &str) -> (&str, bool) {
    for (open, close) in [('(', ')'), ('[', ']')] {
        if let Some(inner) = token
            .strip_prefix(open)
            .and_then(|t| t.strip_suffix(close))
        {
            return (inner.trim(), true);
        }
    }
    (token, false)
}

/// Leading numeric prefix of a total-points cell.
///
/// `"5 T"` and `"5T"` give 5; the tie-break annotation is dropped. A blank
/// cell is `Ok(None)`, an unreadable one an error message.
pub fn parse_total_points(text: &str) -> Result<Option<f64>, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    LEADING_NUMBER
        .captures(trimmed)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(Some)
        .ok_or_else(|| format!("invalid total points {:?}", trimmed))
}

/// Decoded position cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionCell {
    Placed(u32),
    NonFinish(NonFinish),
    Blank,
}

/// Parse a position cell: `"1"`, `"1st"`, `"3T"`, or a DNF/DNS/DNC code
pub fn parse_position(text: &str) -> Result<PositionCell, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(PositionCell::Blank);
    }
    if let Some(code) = NonFinish::detect(trimmed) {
        return Ok(PositionCell::NonFinish(code));
    }
    LEADING_INTEGER
        .captures(trimmed)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .map(PositionCell::Placed)
        .ok_or_else(|| format!("invalid position {:?}", trimmed))
}

/// Render outcomes in canonical results-string form, e.g. `"1-(3)-DNF-"`.
///
/// Gaps left by unparsable tokens are written as `?`, so indices survive
/// a round trip through [`parse_results`] as parse errors at the same
/// positions.
pub fn format_outcomes(outcomes: &[RaceOutcome]) -> String {
    let mut out = String::new();
    let mut next_index = 1;

    for outcome in outcomes {
        while next_index < outcome.race_index {
            out.push_str("?-");
            next_index += 1;
        }

        let code = if outcome.dnf {
            Some(NonFinish::Dnf)
        } else if outcome.dns {
            Some(NonFinish::Dns)
        } else if outcome.dnc {
            Some(NonFinish::Dnc)
        } else {
            None
        };
        let body = match (code, outcome.points) {
            (Some(code), _) => code.as_str().to_string(),
            (None, Some(points)) => format_points(points),
            (None, None) => "?".to_string(),
        };

        if outcome.discarded {
            out.push('(');
            out.push_str(&body);
            out.push(')');
        } else {
            out.push_str(&body);
        }
        out.push('-');
        next_index = outcome.race_index + 1;
    }

    out
}

/// Shortest decimal text that reads back as `points`.
///
/// Whole numbers have no trailing `.0`, and values past the `i64` range
/// are written in full rather than saturated.
pub fn format_points(points: f64) -> String {
    points.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_sequence() {
        let parsed = parse_results("1-3-2-");
        assert!(parsed.errors.is_empty());
        assert_eq!(
            parsed.outcomes,
            vec![
                RaceOutcome::scored(1, 1.0),
                RaceOutcome::scored(2, 3.0),
                RaceOutcome::scored(3, 2.0),
            ]
        );
        assert_eq!(parsed.race_count(), 3);
    }

    #[test]
    fn test_without_trailing_separator() {
        let parsed = parse_results("4-5");
        assert_eq!(parsed.outcomes.len(), 2);
        assert_eq!(parsed.outcomes[1].points, Some(5.0));
    }

    #[test]
    fn test_dnf_token() {
        let parsed = parse_results("1-3-DNF-");
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.outcomes.len(), 3);

        let dnf = &parsed.outcomes[2];
        assert!(dnf.dnf && !dnf.dns && !dnf.dnc);
        assert_eq!(dnf.points, None);
        assert_eq!(parsed.outcomes[0].points, Some(1.0));
        assert_eq!(parsed.outcomes[1].points, Some(3.0));
    }

    #[test]
    fn test_dns_and_dnc_tokens() {
        let parsed = parse_results("dns-2-DNC/8-");
        assert!(parsed.outcomes[0].dns);
        assert!(!parsed.outcomes[1].is_non_finish());
        assert!(parsed.outcomes[2].dnc);
        assert_eq!(parsed.outcomes[2].points, None);
    }

    #[test]
    fn test_dnf_wins_over_dns_in_one_token() {
        let parsed = parse_results("DNS/DNF-");
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.outcomes.len(), 1);

        let outcome = &parsed.outcomes[0];
        assert!(outcome.dnf);
        assert!(!outcome.dns && !outcome.dnc);
        assert_eq!(outcome.points, None);
        assert_eq!(NonFinish::detect("dnc dns"), Some(NonFinish::Dns));
    }

    #[test]
    fn test_compound_takes_left_operand() {
        let parsed = parse_results("5/OCS-2.5/3-");
        assert_eq!(parsed.outcomes[0].points, Some(5.0));
        assert_eq!(parsed.outcomes[1].points, Some(2.5));
    }

    #[test]
    fn test_discarded_scores() {
        let parsed = parse_results("1-(12)-[DNF]-");
        assert!(parsed.errors.is_empty());
        assert!(!parsed.outcomes[0].discarded);
        assert!(parsed.outcomes[1].discarded);
        assert_eq!(parsed.outcomes[1].points, Some(12.0));
        assert!(parsed.outcomes[2].discarded && parsed.outcomes[2].dnf);
    }

    #[test]
    fn test_bad_token_is_skipped_not_fatal() {
        let parsed = parse_results("1-x-3-");
        assert_eq!(parsed.outcomes.len(), 2);
        assert_eq!(parsed.outcomes[0].race_index, 1);
        assert_eq!(parsed.outcomes[1].race_index, 3);
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].contains("race 2"));
        assert_eq!(parsed.race_count(), 3);
    }

    #[test]
    fn test_empty_middle_token_is_error() {
        let parsed = parse_results("1--2");
        assert_eq!(parsed.outcomes.len(), 2);
        assert_eq!(parsed.errors.len(), 1);
    }

    #[test]
    fn test_blank_results() {
        let parsed = parse_results("   ");
        assert!(parsed.outcomes.is_empty());
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn test_total_points() {
        assert_eq!(parse_total_points("5 T"), Ok(Some(5.0)));
        assert_eq!(parse_total_points("5T"), Ok(Some(5.0)));
        assert_eq!(parse_total_points(" 12.5 "), Ok(Some(12.5)));
        assert_eq!(parse_total_points(""), Ok(None));
        assert!(parse_total_points("n/a").is_err());
    }

    #[test]
    fn test_format_points() {
        assert_eq!(format_points(4.0), "4");
        assert_eq!(format_points(12.5), "12.5");
        assert_eq!(format_points(1e20), "100000000000000000000");
        assert_eq!(
            parse_total_points(&format_points(1e20)),
            Ok(Some(1e20))
        );
        assert_eq!(parse_total_points(&format_points(0.1)), Ok(Some(0.1)));
    }

    #[test]
    fn test_position() {
        assert_eq!(parse_position("1"), Ok(PositionCell::Placed(1)));
        assert_eq!(parse_position("2nd"), Ok(PositionCell::Placed(2)));
        assert_eq!(parse_position("3T"), Ok(PositionCell::Placed(3)));
        assert_eq!(
            parse_position("DNF"),
            Ok(PositionCell::NonFinish(NonFinish::Dnf))
        );
        assert_eq!(parse_position(" "), Ok(PositionCell::Blank));
        assert!(parse_position("first").is_err());
    }

    #[test]
    fn test_format_outcomes() {
        let parsed = parse_results("1-(3.5)-DNF-x-DNC-");
        assert_eq!(format_outcomes(&parsed.outcomes), "1-(3.5)-DNF-?-DNC-");

        let reparsed = parse_results(&format_outcomes(&parsed.outcomes));
        assert_eq!(reparsed.outcomes, parsed.outcomes);
        assert_eq!(reparsed.errors.len(), 1);
    }
}
