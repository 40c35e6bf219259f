//! Typed values of XSD literals, for datatype checks and value comparisons.

use oxrdf::vocab::{rdf, xsd};
use oxrdf::{LiteralRef, NamedNodeRef};
use oxsdatatypes::{Boolean, Date, DateTime, Decimal, Double, Integer, Time};
use std::cmp::Ordering;
use std::str::FromStr;

/// The value of a literal, for the datatypes with a known value space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum XsdValue<'a> {
    Decimal(Decimal),
    Double(Double),
    Boolean(Boolean),
    DateTime(DateTime),
    Date(Date),
    Time(Time),
    String(&'a str),
}

/// Outcome of parsing a literal against its datatype.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Parsed<'a> {
    Value(XsdValue<'a>),
    /// The lexical form is not in the lexical space of the datatype.
    IllTyped,
    /// The datatype is not one this crate knows about.
    Unknown,
}

/// Inclusive bounds of the XSD integer datatypes.
const INTEGER_RANGES: [(NamedNodeRef<'static>, i64, i64); 13] = [
    (xsd::INTEGER, i64::MIN, i64::MAX),
    (xsd::LONG, i64::MIN, i64::MAX),
    (xsd::INT, -2_147_483_648, 2_147_483_647),
    (xsd::SHORT, -32_768, 32_767),
    (xsd::BYTE, -128, 127),
    (xsd::NON_NEGATIVE_INTEGER, 0, i64::MAX),
    (xsd::POSITIVE_INTEGER, 1, i64::MAX),
    (xsd::NON_POSITIVE_INTEGER, i64::MIN, 0),
    (xsd::NEGATIVE_INTEGER, i64::MIN, -1),
    (xsd::UNSIGNED_LONG, 0, i64::MAX),
    (xsd::UNSIGNED_INT, 0, 4_294_967_295),
    (xsd::UNSIGNED_SHORT, 0, 65_535),
    (xsd::UNSIGNED_BYTE, 0, 255),
];

pub(crate) fn parse(literal: LiteralRef<'_>) -> Parsed<'_> {
    let lexical = literal.value();
    let datatype = literal.datatype();
    if datatype == xsd::STRING {
        return Parsed::Value(XsdValue::String(lexical));
    }
    if let Some((_, min, max)) = INTEGER_RANGES.iter().find(|(dt, _, _)| *dt == datatype) {
        return parse_integer(lexical, *min, *max);
    }
    let value = if datatype == xsd::DECIMAL {
        Decimal::from_str(lexical).map(XsdValue::Decimal).ok()
    } else if datatype == xsd::DOUBLE || datatype == xsd::FLOAT {
        Double::from_str(lexical).map(XsdValue::Double).ok()
    } else if datatype == xsd::BOOLEAN {
        Boolean::from_str(lexical).map(XsdValue::Boolean).ok()
    } else if datatype == xsd::DATE_TIME {
        DateTime::from_str(lexical).map(XsdValue::DateTime).ok()
    } else if datatype == xsd::DATE {
        Date::from_str(lexical).map(XsdValue::Date).ok()
    } else if datatype == xsd::TIME {
        Time::from_str(lexical).map(XsdValue::Time).ok()
    } else {
        return Parsed::Unknown;
    };
    value.map_or(Parsed::IllTyped, Parsed::Value)
}

fn parse_integer(lexical: &str, min: i64, max: i64) -> Parsed<'static> {
    match Integer::from_str(lexical) {
        Ok(value) if (min..=max).contains(&i64::from(value)) => {
            Parsed::Value(XsdValue::Decimal(value.into()))
        }
        _ => Parsed::IllTyped,
    }
}

/// Is the lexical form of `literal` valid for its datatype?
///
/// Datatypes without a known value space are always considered valid, except
/// `rdf:langString` literals that must carry a language tag.
pub(crate) fn is_well_formed(literal: LiteralRef<'_>) -> bool {
    if literal.datatype() == rdf::LANG_STRING {
        return literal.language().is_some();
    }
    !matches!(parse(literal), Parsed::IllTyped)
}

/// Compares the values of two literals.
///
/// Returns `None` if they are not comparable: ill-typed, of unrelated or unknown
/// datatypes, or partially ordered and not ordered together.
pub(crate) fn compare(left: LiteralRef<'_>, right: LiteralRef<'_>) -> Option<Ordering> {
    let (Parsed::Value(left), Parsed::Value(right)) = (parse(left), parse(right)) else {
        return None;
    };
    match (left, right) {
        (XsdValue::Decimal(l), XsdValue::Decimal(r)) => Some(l.cmp(&r)),
        (XsdValue::Decimal(l), XsdValue::Double(r)) => Double::from(l).partial_cmp(&r),
        (XsdValue::Double(l), XsdValue::Decimal(r)) => l.partial_cmp(&Double::from(r)),
        (XsdValue::Double(l), XsdValue::Double(r)) => l.partial_cmp(&r),
        (XsdValue::Boolean(l), XsdValue::Boolean(r)) => Some(bool::from(l).cmp(&bool::from(r))),
        (XsdValue::DateTime(l), XsdValue::DateTime(r)) => l.partial_cmp(&r),
        (XsdValue::Date(l), XsdValue::Date(r)) => l.partial_cmp(&r),
        (XsdValue::Time(l), XsdValue::Time(r)) => l.partial_cmp(&r),
        (XsdValue::String(l), XsdValue::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}
