//! Composite identifiers for result entries
//!
//! An identifier is the ordered, flattened list of its parts in canonical
//! string form, joined with `|`. Backslashes and pipes inside a part are
//! escaped, so the join is reversible with [`split_id`] and stays readable
//! when debugging cache keys.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::ScopeId;
use crate::statistics::types::{Interval, Sorting, TimeRange};

const SEPARATOR: char = '|';
const ESCAPE: char = '\\';
/// Canonical form of a null part. Cannot be produced by an escaped string.
const NULL: &str = "\\0";

/// One element of an identifier. Lists are flattened depth-first.
#[derive(Debug, Clone, PartialEq)]
pub enum IdPart {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    List(Vec<IdPart>),
}

impl From<&str> for IdPart {
    fn from(value: &str) -> Self {
        IdPart::Str(value.to_string())
    }
}

impl From<String> for IdPart {
    fn from(value: String) -> Self {
        IdPart::Str(value)
    }
}

impl From<i64> for IdPart {
    fn from(value: i64) -> Self {
        IdPart::Int(value)
    }
}

impl From<u64> for IdPart {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(IdPart::Int)
            .unwrap_or_else(|_| IdPart::Str(value.to_string()))
    }
}

impl From<f64> for IdPart {
    fn from(value: f64) -> Self {
        IdPart::Float(value)
    }
}

impl From<DateTime<Utc>> for IdPart {
    fn from(value: DateTime<Utc>) -> Self {
        IdPart::Timestamp(value)
    }
}

impl From<Sorting> for IdPart {
    fn from(value: Sorting) -> Self {
        IdPart::Str(value.as_str().to_string())
    }
}

impl From<TimeRange> for IdPart {
    fn from(value: TimeRange) -> Self {
        IdPart::Str(value.as_str().to_string())
    }
}

impl From<Interval> for IdPart {
    fn from(value: Interval) -> Self {
        IdPart::Str(value.as_str().to_string())
    }
}

impl From<&ScopeId> for IdPart {
    fn from(value: &ScopeId) -> Self {
        IdPart::Str(value.as_str().to_string())
    }
}

impl<T: Into<IdPart>> From<Option<T>> for IdPart {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(IdPart::Null)
    }
}

impl<T: Into<IdPart>> From<Vec<T>> for IdPart {
    fn from(values: Vec<T>) -> Self {
        IdPart::List(values.into_iter().map(Into::into).collect())
    }
}

/// Build the identifier for an ordered list of parts
pub fn recursive_id(parts: &[IdPart]) -> String {
    let mut id = String::new();
    let mut first = true;

    // Reversed so that popping yields parts in their original order
    let mut stack: Vec<&IdPart> = parts.iter().rev().collect();

    while let Some(part) = stack.pop() {
        if let IdPart::List(children) = part {
            stack.extend(children.iter().rev());
            continue;
        }

        if !first {
            id.push(SEPARATOR);
        }
        first = false;
        push_canonical(&mut id, part);
    }

    id
}

fn push_canonical(out: &mut String, part: &IdPart) {
    match part {
        IdPart::Null => out.push_str(NULL),
        IdPart::Str(value) => push_escaped(out, value),
        IdPart::Int(value) => out.push_str(&value.to_string()),
        IdPart::Float(value) => {
            let mut buffer = ryu::Buffer::new();
            out.push_str(buffer.format(*value));
        }
        IdPart::Timestamp(value) => {
            out.push_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        IdPart::List(_) => unreachable!("lists are flattened before canonicalisation"),
    }
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        if c == SEPARATOR || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

/// Split an identifier back into its flattened canonical parts.
/// Null parts come back as `None`.
pub fn split_id(id: &str) -> Vec<Option<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut is_null = false;
    let mut chars = id.chars();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.next() {
                Some('0') => is_null = true,
                Some(escaped) => current.push(escaped),
                None => current.push(ESCAPE),
            },
            SEPARATOR => {
                parts.push(finish_part(&mut current, &mut is_null));
            }
            other => current.push(other),
        }
    }
    parts.push(finish_part(&mut current, &mut is_null));

    parts
}

fn finish_part(current: &mut String, is_null: &mut bool) -> Option<String> {
    let part = if *is_null {
        None
    } else {
        Some(std::mem::take(current))
    };
    current.clear();
    *is_null = false;
    part
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scopes(ids: &[&str]) -> IdPart {
        IdPart::List(ids.iter().map(|id| IdPart::from(*id)).collect())
    }

    #[test]
    fn test_flattens_nested_lists_in_order() {
        let nested = recursive_id(&[
            "English".into(),
            IdPart::List(vec![
                Sorting::Top.into(),
                IdPart::List(vec![TimeRange::Last7Days.into()]),
            ]),
            scopes(&["a", "b"]),
        ]);

        assert_eq!(nested, "English|TOP|LAST_7_DAYS|a|b");
    }

    #[test]
    fn test_canonical_scalars() {
        let created = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let id = recursive_id(&[
            IdPart::Int(-42),
            IdPart::Float(1.5),
            IdPart::Float(3.0),
            IdPart::Timestamp(created),
            IdPart::Null,
        ]);

        assert_eq!(id, "-42|1.5|3.0|2024-01-02T03:04:05.000Z|\\0");
    }

    #[test]
    fn test_same_input_same_id() {
        let build = || {
            recursive_id(&[
                "English".into(),
                Sorting::Recent.into(),
                None::<TimeRange>.into(),
                scopes(&["x", "y"]),
            ])
        };

        assert_eq!(build(), build());
    }

    #[test]
    fn test_scope_order_changes_id() {
        let forward = recursive_id(&["English".into(), scopes(&["x", "y"])]);
        let reversed = recursive_id(&["English".into(), scopes(&["y", "x"])]);

        assert_ne!(forward, reversed);
    }

    #[test]
    fn test_separator_inside_values_does_not_collide() {
        let joined = recursive_id(&["a|b".into(), "c".into()]);
        let split = recursive_id(&["a".into(), "b|c".into()]);

        assert_ne!(joined, split);
        assert_eq!(split_id(&joined), vec![Some("a|b".to_string()), Some("c".to_string())]);
    }

    #[test]
    fn test_null_differs_from_literal_strings() {
        let null = recursive_id(&[IdPart::Null]);
        let literal = recursive_id(&["\\0".into()]);
        let word = recursive_id(&["null".into()]);

        assert_ne!(null, literal);
        assert_ne!(null, word);
        assert_eq!(split_id(&null), vec![None]);
        assert_eq!(split_id(&literal), vec![Some("\\0".to_string())]);
    }

    #[test]
    fn test_split_recovers_parts() {
        let id = recursive_id(&[
            "back\\slash".into(),
            IdPart::Null,
            "".into(),
            IdPart::Int(7),
        ]);

        assert_eq!(
            split_id(&id),
            vec![
                Some("back\\slash".to_string()),
                None,
                Some(String::new()),
                Some("7".to_string()),
            ]
        );
    }
}
