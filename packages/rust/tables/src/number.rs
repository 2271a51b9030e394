//! Numeric extraction from formatted cell text, and rendering back.
//!
//! Cells look like `$1,234.50`, `12.5%`, `(300)` or `1 200`. Parsing strips
//! the decoration and remembers it as a [`NumberFormat`] so a computed result
//! can be written in the same convention as its operands.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Currency symbols recognised in cells.
const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

/// Symbol used when a currency result has no symbol to copy.
const DEFAULT_CURRENCY: char = '$';

/// Minimum decimal places shown for currency.
const CURRENCY_MIN_PRECISION: usize = 2;

/// What is left once decoration is stripped: optional sign, digits, optional
/// fraction.
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?)(\d*)(?:\.(\d+))?$").expect("number regex")
});

/// Display convention inferred from a cell's symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatHint {
    Plain,
    Currency,
    Percentage,
}

impl FormatHint {
    /// Tie-break order for the majority vote: currency beats percentage
    /// beats plain.
    fn rank(self) -> u8 {
        match self {
            Self::Currency => 2,
            Self::Percentage => 1,
            Self::Plain => 0,
        }
    }
}

/// Full formatting convention of one numeric cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NumberFormat {
    pub hint: FormatHint,
    /// Currency symbol, when `hint` is [`FormatHint::Currency`].
    pub symbol: Option<char>,
    /// Whether thousands are separated with commas.
    pub grouped: bool,
    /// Digits after the decimal point.
    pub precision: usize,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            hint: FormatHint::Plain,
            symbol: None,
            grouped: false,
            precision: 0,
        }
    }
}

/// A number pulled out of a cell, with the format it was written in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParsedNumber {
    pub value: f64,
    pub format: NumberFormat,
}

/// Parse a cell's text as a number.
///
/// Currency symbols, percent signs, thousands separators and surrounding
/// whitespace are stripped; `(...)` and a leading `-` mark negatives. Returns `None` when
/// nothing numeric remains.
pub fn parse_number(text: &str) -> Option<ParsedNumber> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let symbol = text.chars().find(|c| CURRENCY_SYMBOLS.contains(c));
    let percent = text.contains('%');
    let grouped = has_thousands_separator(text);

    let chars: Vec<char> = text.chars().collect();
    let mut cleaned: String = chars
        .iter()
        .enumerate()
        .filter(|&(i, c)| {
            if c.is_whitespace() {
                return splits_digits(&chars, i) && !is_digit_group_gap(&chars, i);
            }
            *c != ',' && *c != '%' && !CURRENCY_SYMBOLS.contains(c)
        })
        .map(|(_, c)| *c)
        .collect();

    let mut negative = false;
    if cleaned.len() > 2 && cleaned.starts_with('(') && cleaned.ends_with(')') {
        negative = true;
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }

    let caps = NUMBER_RE.captures(&cleaned)?;
    let int_part = caps.get(2).map_or("", |m| m.as_str());
    let frac_part = caps.get(3).map_or("", |m| m.as_str());
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if caps.get(1).is_some_and(|m| m.as_str() == "-") {
        negative = !negative;
    }

    let digits = format!(
        "{}.{}",
        if int_part.is_empty() { "0" } else { int_part },
        if frac_part.is_empty() { "0" } else { frac_part }
    );
    let magnitude: f64 = digits.parse().ok()?;

    let hint = match (symbol, percent) {
        (Some(_), _) => FormatHint::Currency,
        (None, true) => FormatHint::Percentage,
        (None, false) => FormatHint::Plain,
    };

    Some(ParsedNumber {
        value: if negative { -magnitude } else { magnitude },
        format: NumberFormat {
            hint,
            symbol,
            grouped,
            precision: frac_part.len(),
        },
    })
}

/// Whether the character at `i` sits between two digits.
fn splits_digits(chars: &[char], i: usize) -> bool {
    let before = i.checked_sub(1).and_then(|j| chars.get(j));
    let after = chars.get(i + 1);
    before.is_some_and(char::is_ascii_digit) && after.is_some_and(char::is_ascii_digit)
}

/// A space between digits separates thousands only when exactly three digits
/// follow it, e.g. `1 200`. `10 20` is two numbers, not one.
fn is_digit_group_gap(chars: &[char], i: usize) -> bool {
    let run = chars[i + 1..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .count();
    run == 3
}

/// A comma sitting between two digits, e.g. `1,234`.
fn has_thousands_separator(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    chars.windows(3).any(|w| {
        w[1] == ',' && w[0].is_ascii_digit() && w[2].is_ascii_digit()
    })
}

/// Pick the format a result should be rendered in, from its operands.
///
/// Majority vote over hints (ties broken currency > percentage > plain);
/// precision is the largest seen (at least 2 for currency); currency is always
/// grouped, other hints only when some operand was.
pub fn vote_format<'a>(formats: impl IntoIterator<Item = &'a NumberFormat>) -> NumberFormat {
    let formats: Vec<&NumberFormat> = formats.into_iter().collect();
    if formats.is_empty() {
        return NumberFormat::default();
    }

    let hint = [FormatHint::Currency, FormatHint::Percentage, FormatHint::Plain]
        .into_iter()
        .max_by_key(|hint| {
            let votes = formats.iter().filter(|f| f.hint == *hint).count();
            (votes, hint.rank())
        })
        .unwrap_or(FormatHint::Plain);

    let mut precision = formats.iter().map(|f| f.precision).max().unwrap_or(0);
    let (symbol, grouped) = match hint {
        FormatHint::Currency => {
            precision = precision.max(CURRENCY_MIN_PRECISION);
            (Some(most_common_symbol(&formats)), true)
        }
        _ => (None, formats.iter().any(|f| f.grouped)),
    };

    NumberFormat {
        hint,
        symbol,
        grouped,
        precision,
    }
}

/// Most frequent currency symbol; earliest wins a tie.
fn most_common_symbol(formats: &[&NumberFormat]) -> char {
    let symbols: Vec<char> = formats.iter().filter_map(|f| f.symbol).collect();
    let mut best: Option<(char, usize)> = None;
    for &candidate in &symbols {
        let count = symbols.iter().filter(|&&s| s == candidate).count();
        if best.is_none_or(|(_, n)| count > n) {
            best = Some((candidate, count));
        }
    }
    best.map_or(DEFAULT_CURRENCY, |(s, _)| s)
}

/// Render a value in the given convention.
pub fn render_number(value: f64, format: &NumberFormat) -> String {
    let fixed = format!("{:.*}", format.precision, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let int_part = if format.grouped {
        group_thousands(int_part)
    } else {
        int_part.to_string()
    };

    // Rounding can turn a tiny negative into zero; never print "-0.00".
    let negative = value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if format.hint == FormatHint::Currency {
        out.push(format.symbol.unwrap_or(DEFAULT_CURRENCY));
    }
    out.push_str(&int_part);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    if format.hint == FormatHint::Percentage {
        out.push('%');
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
