//! Command-line tag edits: `Tag=Value` assignments and removal lists.

use std::collections::BTreeMap;

use zkexif_common::{Error, Result};

/// Parse `Tag=Value` arguments into a write set.
///
/// Values of the form `[-+]digits[.digits]` are written as numbers, so
/// `+007` becomes `7` and `2.50` becomes `2.5`; anything else is kept
/// verbatim after trimming.
pub fn parse_assignments<S: AsRef<str>>(args: &[S]) -> Result<BTreeMap<String, Option<String>>> {
    if args.is_empty() {
        return Err(Error::MetadataTool("no Tag=Value arguments given".into()));
    }
    let mut tags = BTreeMap::new();
    for arg in args {
        let arg = arg.as_ref();
        let (key, value) = arg
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .ok_or_else(|| {
                Error::MetadataTool(format!("invalid tag argument '{arg}', expected Tag=Value"))
            })?;
        tags.insert(key.to_string(), Some(normalize_value(value)));
    }
    Ok(tags)
}

/// Tag names to delete; blank names are ignored but at least one is required.
pub fn parse_removals<S: AsRef<str>>(names: &[S]) -> Result<BTreeMap<String, Option<String>>> {
    let tags: BTreeMap<_, _> = names
        .iter()
        .map(|name| name.as_ref().trim())
        .filter(|name| !name.is_empty())
        .map(|name| (name.to_string(), None))
        .collect();
    if tags.is_empty() {
        return Err(Error::MetadataTool("no tag names provided".into()));
    }
    Ok(tags)
}

fn normalize_value(value: &str) -> String {
    if !is_decimal_literal(value) {
        return value.to_string();
    }
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => {
            if number.fract() == 0.0 && number.abs() < 9.007_199_254_740_992e15 {
                format!("{}", number as i64)
            } else {
                number.to_string()
            }
        }
        _ => value.to_string(),
    }
}

fn is_decimal_literal(value: &str) -> bool {
    let unsigned = value
        .strip_prefix('-')
        .or_else(|| value.strip_prefix('+'))
        .unwrap_or(value);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(int_part) && frac_part.map_or(true, all_digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_are_normalized() {
        let tags = parse_assignments(&["ISO=+0100", "FNumber=2.50", "Exposure=-3"]).unwrap();
        assert_eq!(tags["ISO"].as_deref(), Some("100"));
        assert_eq!(tags["FNumber"].as_deref(), Some("2.5"));
        assert_eq!(tags["Exposure"].as_deref(), Some("-3"));
    }

    #[test]
    fn non_numeric_values_are_kept() {
        let tags = parse_assignments(&["Artist= Jane Doe ", "Version=1.2.3", "Note=.5"]).unwrap();
        assert_eq!(tags["Artist"].as_deref(), Some("Jane Doe"));
        assert_eq!(tags["Version"].as_deref(), Some("1.2.3"));
        assert_eq!(tags["Note"].as_deref(), Some(".5"));
    }

    #[test]
    fn empty_key_or_value_is_rejected() {
        assert!(parse_assignments(&["=x"]).is_err());
        assert!(parse_assignments(&["Artist="]).is_err());
        assert!(parse_assignments(&["Artist"]).is_err());
        assert!(parse_assignments::<&str>(&[]).is_err());
    }

    #[test]
    fn removals_skip_blanks() {
        let tags = parse_removals(&["GPSLatitude", "  ", "GPSLongitude "]).unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags["GPSLongitude"].is_none());
        assert!(parse_removals(&[" "]).is_err());
    }
}
