//! Cascading multi-key sorting.
//!
//! Records expose named properties through [`Sortable`]. A [`SortSpec`]
//! lists properties in precedence order with a parallel, possibly shorter,
//! list of directions; positions without a direction sort ascending.
//!
//! ```
//! use structured_eval::sort::{sort_by_properties, SortOrder, SortSpec, SortValue, Sortable};
//!
//! #[derive(Clone, Copy)]
//! enum Field { Score, Name }
//!
//! struct Row { score: f64, name: &'static str }
//!
//! impl Sortable for Row {
//!     type Property = Field;
//!     fn sort_value(&self, field: Field) -> SortValue<'_> {
//!         match field {
//!             Field::Score => SortValue::Number(self.score),
//!             Field::Name => SortValue::Text(self.name),
//!         }
//!     }
//! }
//!
//! let mut rows = vec![Row { score: 1.0, name: "b" }, Row { score: 2.0, name: "a" }];
//! let spec = SortSpec::new([Field::Score, Field::Name]).with_orders([SortOrder::Desc]);
//! sort_by_properties(&mut rows, &spec);
//! assert_eq!(rows[0].name, "a");
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing a textual sort specification
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SortSpecError {
    #[error("Unknown sort order: {0} (expected asc or desc)")]
    UnknownOrder(String),

    #[error("Unknown sort property: {0}")]
    UnknownProperty(String),

    #[error("Sort specification is empty")]
    Empty,
}

/// Direction for a single sort key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

impl FromStr for SortOrder {
    type Err = SortSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(SortSpecError::UnknownOrder(s.to_string())),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// Value of a record property as seen by the sorter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortValue<'a> {
    Number(f64),
    Text(&'a str),
    /// Property has no value for this record. Ordered after every present
    /// value regardless of direction.
    Absent,
}

impl SortValue<'_> {
    /// Natural ordering between two present values.
    ///
    /// Numbers use `f64::total_cmp`, so NaN orders above every number.
    ///
    /// Mixing numbers and text under one property is a caller error and
    /// compares equal.
    fn natural_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl From<f64> for SortValue<'_> {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Option<f64>> for SortValue<'_> {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Absent, Self::Number)
    }
}

/// A record whose properties can drive a cascading sort
pub trait Sortable {
    /// Property selector, usually a fieldless enum
    type Property: Copy;

    /// Value of `property` for this record
    fn sort_value(&self, property: Self::Property) -> SortValue<'_>;
}

impl<T: Sortable + ?Sized> Sortable for &T {
    type Property = T::Property;

    fn sort_value(&self, property: Self::Property) -> SortValue<'_> {
        (**self).sort_value(property)
    }
}

/// Ordered property list plus per-position directions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec<P> {
    properties: Vec<P>,
    orders: Vec<SortOrder>,
}

impl<P: Copy> SortSpec<P> {
    /// Sort by `properties` in precedence order, all ascending
    #[must_use]
    pub fn new(properties: impl Into<Vec<P>>) -> Self {
        Self {
            properties: properties.into(),
            orders: Vec::new(),
        }
    }

    /// Set directions by position; missing positions stay ascending
    #[must_use]
    pub fn with_orders(mut self, orders: impl Into<Vec<SortOrder>>) -> Self {
        self.orders = orders.into();
        self
    }

    /// Properties in precedence order
    #[must_use]
    pub fn properties(&self) -> &[P] {
        &self.properties
    }

    /// Direction of the key at `index`
    #[must_use]
    pub fn order_at(&self, index: usize) -> SortOrder {
        self.orders.get(index).copied().unwrap_or_default()
    }

    /// Compare two records key by key, falling through on ties
    pub fn compare<T>(&self, a: &T, b: &T) -> Ordering
    where
        T: Sortable<Property = P> + ?Sized,
    {
        for (index, property) in self.properties.iter().enumerate() {
            let ordering = match (a.sort_value(*property), b.sort_value(*property)) {
                (SortValue::Absent, SortValue::Absent) => Ordering::Equal,
                (SortValue::Absent, _) => return Ordering::Greater,
                (_, SortValue::Absent) => return Ordering::Less,
                (left, right) => self.order_at(index).apply(left.natural_cmp(&right)),
            };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl<P> FromStr for SortSpec<P>
where
    P: Copy + FromStr,
{
    type Err = SortSpecError;

    /// Parse `property[:order],property[:order],...`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut properties = Vec::new();
        let mut orders = Vec::new();

        for key in s.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            let (name, order) = match key.split_once(':') {
                Some((name, order)) => (name.trim(), order.trim().parse()?),
                None => (key, SortOrder::Asc),
            };
            let property = name
                .parse()
                .map_err(|_| SortSpecError::UnknownProperty(name.to_string()))?;
            properties.push(property);
            orders.push(order);
        }

        if properties.is_empty() {
            return Err(SortSpecError::Empty);
        }

        Ok(Self { properties, orders })
    }
}

/// Sort `items` in place according to `spec`.
///
/// Callers must not rely on the relative order of records that compare
/// equal on every listed property.
pub fn sort_by_properties<T: Sortable>(items: &mut [T], spec: &SortSpec<T::Property>) {
    items.sort_by(|a, b| spec.compare(a, b));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Key {
        A,
        B,
        Label,
        Maybe,
    }

    impl FromStr for Key {
        type Err = ();

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "a" => Ok(Self::A),
                "b" => Ok(Self::B),
                "label" => Ok(Self::Label),
                _ => Err(()),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Pair {
        a: f64,
        b: f64,
        label: &'static str,
        maybe: Option<f64>,
    }

    fn pair(a: f64, b: f64) -> Pair {
        Pair {
            a,
            b,
            label: "",
            maybe: None,
        }
    }

    impl Sortable for Pair {
        type Property = Key;

        fn sort_value(&self, property: Key) -> SortValue<'_> {
            match property {
                Key::A => SortValue::Number(self.a),
                Key::B => SortValue::Number(self.b),
                Key::Label => SortValue::Text(self.label),
                Key::Maybe => self.maybe.into(),
            }
        }
    }

    fn ab(items: &[Pair]) -> Vec<(f64, f64)> {
        items.iter().map(|p| (p.a, p.b)).collect()
    }

    #[test]
    fn test_cascading_ascending() {
        let mut items = vec![pair(2.0, 1.0), pair(1.0, 2.0), pair(1.0, 1.0)];
        sort_by_properties(&mut items, &SortSpec::new([Key::A, Key::B]));
        assert_eq!(ab(&items), vec![(1.0, 1.0), (1.0, 2.0), (2.0, 1.0)]);
    }

    #[test]
    fn test_direction_affects_only_its_key() {
        let mut items = vec![pair(2.0, 1.0), pair(1.0, 2.0), pair(1.0, 1.0)];
        let spec = SortSpec::new([Key::A, Key::B]).with_orders([SortOrder::Asc, SortOrder::Desc]);
        sort_by_properties(&mut items, &spec);
        // `a` still ascending, ties on `a` now broken by `b` descending
        assert_eq!(ab(&items), vec![(1.0, 2.0), (1.0, 1.0), (2.0, 1.0)]);

        let spec = SortSpec::new([Key::A, Key::B]).with_orders([SortOrder::Desc]);
        sort_by_properties(&mut items, &spec);
        assert_eq!(ab(&items), vec![(2.0, 1.0), (1.0, 1.0), (1.0, 2.0)]);
    }

    #[test]
    fn test_missing_orders_default_to_ascending() {
        let spec: SortSpec<Key> = SortSpec::new([Key::A, Key::B, Key::Label]).with_orders([SortOrder::Desc]);
        assert_eq!(spec.order_at(0), SortOrder::Desc);
        assert_eq!(spec.order_at(1), SortOrder::Asc);
        assert_eq!(spec.order_at(2), SortOrder::Asc);
    }

    #[test]
    fn test_equal_on_all_keys() {
        let spec = SortSpec::new([Key::A, Key::B]);
        assert_eq!(spec.compare(&pair(1.0, 1.0), &pair(1.0, 1.0)), Ordering::Equal);
    }

    #[test]
    fn test_empty_property_list_compares_equal() {
        let spec: SortSpec<Key> = SortSpec::new(Vec::new());
        assert_eq!(spec.compare(&pair(1.0, 0.0), &pair(2.0, 0.0)), Ordering::Equal);
    }

    #[test]
    fn test_text_properties_sort_lexicographically() {
        let mut items = vec![
            Pair { label: "gemma2:9b", ..pair(0.0, 0.0) },
            Pair { label: "codegemma:2b", ..pair(0.0, 0.0) },
            Pair { label: "llama3.2:1b", ..pair(0.0, 0.0) },
        ];
        sort_by_properties(&mut items, &SortSpec::new([Key::Label]));
        let labels: Vec<_> = items.iter().map(|p| p.label).collect();
        assert_eq!(labels, vec!["codegemma:2b", "gemma2:9b", "llama3.2:1b"]);
    }

    #[test]
    fn test_numbers_sort_numerically() {
        let mut items = vec![pair(10.0, 0.0), pair(9.0, 0.0), pair(100.0, 0.0)];
        sort_by_properties(&mut items, &SortSpec::new([Key::A]));
        assert_eq!(ab(&items), vec![(9.0, 0.0), (10.0, 0.0), (100.0, 0.0)]);
    }

    #[test]
    fn test_nan_sorts_consistently() {
        let items = [pair(f64::NAN, 0.0), pair(2.0, 0.0), pair(1.0, 0.0)];
        let spec = SortSpec::new([Key::A]);

        let mut forward = items.to_vec();
        sort_by_properties(&mut forward, &spec);
        let mut backward = items.to_vec();
        backward.reverse();
        sort_by_properties(&mut backward, &spec);

        assert_eq!(forward[0].a, 1.0);
        assert_eq!(forward[1].a, 2.0);
        assert!(forward[2].a.is_nan());
        assert!(backward[2].a.is_nan());
        assert_eq!(spec.compare(&items[0], &items[1]), Ordering::Greater);
    }

    #[test]
    fn test_absent_values_sort_last_in_both_directions() {
        let make = |a, maybe| Pair { maybe, ..pair(a, 0.0) };
        let mut items = vec![make(1.0, None), make(2.0, Some(5.0)), make(3.0, Some(1.0))];

        sort_by_properties(&mut items, &SortSpec::new([Key::Maybe]));
        assert_eq!(items.iter().map(|p| p.a).collect::<Vec<_>>(), vec![3.0, 2.0, 1.0]);

        let desc = SortSpec::new([Key::Maybe]).with_orders([SortOrder::Desc]);
        sort_by_properties(&mut items, &desc);
        assert_eq!(items.iter().map(|p| p.a).collect::<Vec<_>>(), vec![2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_sorting_references() {
        let owned = vec![pair(3.0, 0.0), pair(1.0, 0.0), pair(2.0, 0.0)];
        let mut refs: Vec<&Pair> = owned.iter().collect();
        sort_by_properties(&mut refs, &SortSpec::new([Key::A]));
        assert_eq!(refs.iter().map(|p| p.a).collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!("asc".parse::<SortOrder>(), Ok(SortOrder::Asc));
        assert_eq!("DESC".parse::<SortOrder>(), Ok(SortOrder::Desc));
        assert!(matches!(
            "sideways".parse::<SortOrder>(),
            Err(SortSpecError::UnknownOrder(_))
        ));
    }

    #[test]
    fn test_sort_spec_parsing() {
        let spec: SortSpec<Key> = "a:desc, b, label:asc".parse().unwrap();
        assert_eq!(spec.properties(), &[Key::A, Key::B, Key::Label]);
        assert_eq!(spec.order_at(0), SortOrder::Desc);
        assert_eq!(spec.order_at(1), SortOrder::Asc);
        assert_eq!(spec.order_at(2), SortOrder::Asc);
    }

    #[test]
    fn test_sort_spec_parsing_errors() {
        assert_eq!(
            "nope".parse::<SortSpec<Key>>(),
            Err(SortSpecError::UnknownProperty("nope".to_string()))
        );
        assert_eq!("".parse::<SortSpec<Key>>(), Err(SortSpecError::Empty));
        assert!(matches!(
            "a:up".parse::<SortSpec<Key>>(),
            Err(SortSpecError::UnknownOrder(_))
        ));
    }
}
