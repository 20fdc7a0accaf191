//! Method-name grammar: `find<Subject>By<Field><Op>(And<Field><Op>)*[OrderBy...]`.
//!
//! Parsing is purely syntactic. Field names are resolved against entity
//! metadata by the descriptor builder.

use crate::query::predicate::{Comparator, Direction};
use once_cell::sync::Lazy;
use regex::Regex;

static METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(find|read|get|query|search|stream|count)([A-Z][A-Za-z0-9]*?)??By([A-Za-z0-9]*)$")
        .expect("valid method grammar regex")
});
/// `Distinct` and `Top`/`First` only count right after the prefix and
/// must end at a word boundary, so `Topics` or `Firstname` stay subject text.
static SUBJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Distinct)?(?:(Top|First)(\d*))?(?:[A-Z][A-Za-z0-9]*)?$")
        .expect("valid subject regex")
});
static ORDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z][A-Za-z0-9]*?)(Asc|Desc)").expect("valid order regex"));

/// Operator suffixes, longest spelling first so `GreaterThanEqual` wins
/// over `GreaterThan` and `IsNotNull` over `NotNull`.
const OPERATOR_SUFFIXES: &[(&str, Comparator)] = &[
    ("GreaterThanEqual", Comparator::GreaterThanEqual),
    ("LessThanEqual", Comparator::LessThanEqual),
    ("GreaterThan", Comparator::GreaterThan),
    ("LessThan", Comparator::LessThan),
    ("IsNotNull", Comparator::IsNotNull),
    ("NotNull", Comparator::IsNotNull),
    ("IsNull", Comparator::IsNull),
    ("Null", Comparator::IsNull),
    ("IsBetween", Comparator::Between),
    ("Between", Comparator::Between),
    ("StartingWith", Comparator::StartingWith),
    ("StartsWith", Comparator::StartingWith),
    ("EndingWith", Comparator::EndingWith),
    ("EndsWith", Comparator::EndingWith),
    ("Containing", Comparator::Containing),
    ("Contains", Comparator::Containing),
    ("IsNotIn", Comparator::NotIn),
    ("NotIn", Comparator::NotIn),
    ("IsIn", Comparator::In),
    ("In", Comparator::In),
    ("IsLike", Comparator::Like),
    ("Like", Comparator::Like),
    ("IsNot", Comparator::NotEqual),
    ("Not", Comparator::NotEqual),
    ("Equals", Comparator::Equal),
    ("Is", Comparator::Equal),
];

/// What the method returns before cardinality is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodAction {
    Find,
    Count,
}

/// Syntactic result of parsing one method name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodName {
    pub action: MethodAction,
    pub distinct: bool,
    pub limit: Option<u64>,
    /// `(property, comparator)` in declaration order.
    pub parts: Vec<(String, Comparator)>,
    /// `(property, direction)` from the `OrderBy` suffix.
    pub order: Vec<(String, Direction)>,
}

/// Parses a method name; the error string names the offending fragment.
pub fn parse_method_name(method: &str) -> Result<MethodName, String> {
    let caps = METHOD_RE.captures(method).ok_or_else(|| {
        format!("`{method}` does not match `<find|count>[Subject]By<Predicate>`")
    })?;
    let action = if &caps[1] == "count" {
        MethodAction::Count
    } else {
        MethodAction::Find
    };
    let subject = caps.get(2).map_or("", |m| m.as_str());
    let tail = caps.get(3).map_or("", |m| m.as_str());

    let subject_caps = SUBJECT_RE
        .captures(subject)
        .ok_or_else(|| format!("subject `{subject}` is not a word sequence"))?;
    let distinct = subject_caps.get(1).is_some();
    let limit = match subject_caps.get(2) {
        Some(_) => {
            let digits = subject_caps.get(3).map_or("", |m| m.as_str());
            if digits.is_empty() {
                Some(1)
            } else {
                let value: u64 = digits
                    .parse()
                    .map_err(|_| format!("row limit `{digits}` is not a number"))?;
                if value == 0 {
                    return Err("row limit must be at least 1".to_string());
                }
                Some(value)
            }
        }
        None => None,
    };
    if action == MethodAction::Count && limit.is_some() {
        return Err("count methods cannot carry a Top/First limit".to_string());
    }

    let (predicate, order_part) = match tail.find("OrderBy") {
        Some(at) => (&tail[..at], Some(&tail[at + "OrderBy".len()..])),
        None => (tail, None),
    };

    if split_keyword(predicate, "Or").len() > 1 {
        return Err("the `Or` connective is not supported; only `And` may join clauses".into());
    }

    let mut parts = Vec::new();
    if !predicate.is_empty() {
        for part in split_keyword(predicate, "And") {
            parts.push(parse_part(part)?);
        }
    }

    let order = match order_part {
        Some(spec) => parse_order(spec)?,
        None => Vec::new(),
    };

    Ok(MethodName {
        action,
        distinct,
        limit,
        parts,
        order,
    })
}

/// Splits on `keyword` when it is followed by an uppercase letter.
fn split_keyword<'a>(input: &'a str, keyword: &str) -> Vec<&'a str> {
    let bytes = input.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut at = 0;
    while let Some(offset) = input[at..].find(keyword) {
        let found = at + offset;
        let after = found + keyword.len();
        let boundary = found > start
            && bytes.get(after).is_some_and(|byte| byte.is_ascii_uppercase());
        if boundary {
            pieces.push(&input[start..found]);
            start = after;
        }
        at = found + 1;
    }
    pieces.push(&input[start..]);
    pieces
}

fn parse_part(part: &str) -> Result<(String, Comparator), String> {
    let part = part.strip_suffix("IgnoreCase").unwrap_or(part);
    for (suffix, comparator) in OPERATOR_SUFFIXES {
        if let Some(property) = part.strip_suffix(suffix) {
            if !property.is_empty() {
                return Ok((uncapitalize(property), *comparator));
            }
        }
    }
    if part.is_empty() {
        return Err("empty predicate part".to_string());
    }
    Ok((uncapitalize(part), Comparator::Equal))
}

fn parse_order(spec: &str) -> Result<Vec<(String, Direction)>, String> {
    if spec.is_empty() {
        return Err("`OrderBy` must name at least one property".to_string());
    }
    let mut order = Vec::new();
    let mut consumed = 0;
    for caps in ORDER_RE.captures_iter(spec) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        if whole.start != consumed {
            return Err(format!("cannot parse order fragment `{}`", &spec[consumed..]));
        }
        let direction = if &caps[2] == "Desc" {
            Direction::Desc
        } else {
            Direction::Asc
        };
        order.push((uncapitalize(&caps[1]), direction));
        consumed = whole.end;
    }
    if consumed < spec.len() {
        order.push((uncapitalize(&spec[consumed..]), Direction::Asc));
    }
    Ok(order)
}

fn uncapitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
