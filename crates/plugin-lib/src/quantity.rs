//! Kubernetes resource quantity parsing
//!
//! Converts quantity strings such as `500m`, `4`, `8Gi` or `1e3` into
//! approximate `f64` values in base units (cores, bytes).

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

/// Parse a quantity string into its approximate numeric value
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(raw.len());
    let (number, suffix) = raw.split_at(split);
    let number: f64 = number.parse().ok()?;

    let multiplier = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024.0,
        "Mi" => 1024f64.powi(2),
        "Gi" => 1024f64.powi(3),
        "Ti" => 1024f64.powi(4),
        "Pi" => 1024f64.powi(5),
        "Ei" => 1024f64.powi(6),
        exp if exp.starts_with(['e', 'E']) => {
            let exponent: i32 = exp[1..].parse().ok()?;
            10f64.powi(exponent)
        }
        _ => return None,
    };

    let value = number * multiplier;
    value.is_finite().then_some(value)
}

/// Look up `name` in a resource list; absent or unparseable entries count as zero
pub fn resource_value(list: Option<&BTreeMap<String, Quantity>>, name: &str) -> f64 {
    list.and_then(|l| l.get(name))
        .and_then(|q| parse_quantity(&q.0))
        .unwrap_or(0.0)
}

/// Look up `name` in a resource list; absent entries count as zero and an
/// unparseable entry is returned as its raw text
pub fn try_resource_value<'a>(
    list: Option<&'a BTreeMap<String, Quantity>>,
    name: &str,
) -> Result<f64, &'a str> {
    match list.and_then(|l| l.get(name)) {
        None => Ok(0.0),
        Some(q) => parse_quantity(&q.0).ok_or(q.0.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_decimal_suffixes() {
        assert_eq!(parse_quantity("4"), Some(4.0));
        assert_eq!(parse_quantity("2.5"), Some(2.5));
        assert_eq!(parse_quantity("500m"), Some(0.5));
        assert_eq!(parse_quantity("3k"), Some(3000.0));
        assert_eq!(parse_quantity("1G"), Some(1e9));
    }

    #[test]
    fn test_binary_suffixes() {
        assert_eq!(parse_quantity("1Ki"), Some(1024.0));
        assert_eq!(parse_quantity("8Gi"), Some(8.0 * 1024.0 * 1024.0 * 1024.0));
        assert_eq!(parse_quantity("128Mi"), Some(128.0 * 1024.0 * 1024.0));
    }

    #[test]
    fn test_exponent_notation() {
        assert_eq!(parse_quantity("1e3"), Some(1000.0));
        let scaled = parse_quantity("25E-1").unwrap();
        assert!((scaled - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_quantities() {
        assert_eq!(parse_quantity(""), None);
        assert_eq!(parse_quantity("abc"), None);
        assert_eq!(parse_quantity("5Xi"), None);
        assert_eq!(parse_quantity("1e"), None);
    }

    #[test]
    fn test_resource_value_defaults_to_zero() {
        let mut list = BTreeMap::new();
        list.insert("cpu".to_string(), Quantity("250m".to_string()));

        assert_eq!(resource_value(Some(&list), "cpu"), 0.25);
        assert_eq!(resource_value(Some(&list), "memory"), 0.0);
        assert_eq!(resource_value(None, "cpu"), 0.0);
    }

    #[test]
    fn test_try_resource_value_reports_unparseable_entry() {
        let list = BTreeMap::from([
            ("cpu".to_string(), Quantity("250m".to_string())),
            ("memory".to_string(), Quantity("lots".to_string())),
        ]);
        assert_eq!(try_resource_value(Some(&list), "cpu"), Ok(0.25));
        assert_eq!(try_resource_value(Some(&list), "memory"), Err("lots"));
        assert_eq!(try_resource_value(Some(&list), "storage"), Ok(0.0));
        assert_eq!(try_resource_value(None, "cpu"), Ok(0.0));
    }
}
