use crate::{filter::FilterError, value::Value};

/// Build an `ORDER BY` clause from an `order` filter value.
///
/// The value splits on commas. A literal `desc` token anywhere flips the
/// direction for every field and is dropped from the field list; the gap it
/// leaves behind is skipped, as are empty segments. Remaining tokens must be
/// `column` or `table.column` references.
pub fn order_clause(value: &Value) -> Result<String, FilterError> {
    let Value::Text(text) = value else {
        return Err(FilterError::OrderNotText);
    };

    let mut desc = false;
    let mut fields = Vec::new();

    for token in text.split(',') {
        let token = token.trim();

        if token.is_empty() {
            continue;
        }
        if token == "desc" {
            desc = true;
            continue;
        }

        fields.push(quote_field(token)?);
    }

    if fields.is_empty() {
        return Err(FilterError::OrderEmpty);
    }

    let direction = if desc { "DESC" } else { "ASC" };

    Ok(format!("ORDER BY {} {direction}", fields.join(", ")))
}

/// Build a `LIMIT` clause from a `limit` filter value.
///
/// One bound caps the row count; two bounds are offset and count in MySQL
/// `LIMIT from, count` form. Integer values are accepted directly.
pub fn limit_clause(value: &Value) -> Result<String, FilterError> {
    let text = match value {
        Value::Uint(n) => return Ok(format!("LIMIT {n}")),
        Value::Int(n) => {
            return u64::try_from(*n)
                .map(|n| format!("LIMIT {n}"))
                .map_err(|_| FilterError::LimitBadBound(n.to_string()));
        }
        Value::Text(text) => text,
        other => {
            return Err(FilterError::LimitBadBound(
                other.canonical_text().unwrap_or_default(),
            ));
        }
    };

    let bounds = text
        .split(',')
        .map(|bound| {
            let bound = bound.trim();
            bound
                .parse::<u64>()
                .map_err(|_| FilterError::LimitBadBound(bound.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match bounds[..] {
        [count] => Ok(format!("LIMIT {count}")),
        [from, count] => Ok(format!("LIMIT {from}, {count}")),
        _ => Err(FilterError::LimitBadArity(bounds.len())),
    }
}

/// Backtick-quote a `column` or `table.column` reference.
fn quote_field(token: &str) -> Result<String, FilterError> {
    let bad = || FilterError::OrderBadField(token.to_string());

    let mut parts = token.splitn(3, '.');
    let first = parts.next().ok_or_else(bad)?;
    let second = parts.next();

    if parts.next().is_some() || !is_ident(first) || !second.is_none_or(is_ident) {
        return Err(bad());
    }

    Ok(match second {
        Some(column) => format!("`{first}`.`{column}`"),
        None => format!("`{first}`"),
    })
}

fn is_ident(token: &str) -> bool {
    let mut chars = token.chars();

    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
