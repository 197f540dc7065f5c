//! Key ranges over ordered indexes.

/// A range of index keys.
#[derive(Clone, Debug, PartialEq)]
pub enum KeyRange<K> {
    /// All keys
    All,
    /// A single key (equality)
    Only(K),
    /// Keys >= (or >) the lower bound
    LowerBound { value: K, exclusive: bool },
    /// Keys <= (or <) the upper bound
    UpperBound { value: K, exclusive: bool },
    /// Keys between lower and upper bounds
    Bound {
        lower: K,
        upper: K,
        lower_exclusive: bool,
        upper_exclusive: bool,
    },
}

impl<K: Ord> KeyRange<K> {
    /// Creates a range for all keys.
    pub fn all() -> Self {
        KeyRange::All
    }

    /// Creates a range for a single key.
    pub fn only(key: K) -> Self {
        KeyRange::Only(key)
    }

    /// Creates a range with a lower bound.
    pub fn lower_bound(value: K, exclusive: bool) -> Self {
        KeyRange::LowerBound { value, exclusive }
    }

    /// Creates a range with an upper bound.
    pub fn upper_bound(value: K, exclusive: bool) -> Self {
        KeyRange::UpperBound { value, exclusive }
    }

    /// Creates a range with both bounds.
    pub fn bound(lower: K, upper: K, lower_exclusive: bool, upper_exclusive: bool) -> Self {
        KeyRange::Bound {
            lower,
            upper,
            lower_exclusive,
            upper_exclusive,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, KeyRange::All)
    }

    /// Checks if a key is within this range.
    pub fn contains(&self, key: &K) -> bool {
        let above = |value: &K, exclusive: bool| if exclusive { key > value } else { key >= value };
        let below = |value: &K, exclusive: bool| if exclusive { key < value } else { key <= value };
        match self {
            KeyRange::All => true,
            KeyRange::Only(k) => key == k,
            KeyRange::LowerBound { value, exclusive } => above(value, *exclusive),
            KeyRange::UpperBound { value, exclusive } => below(value, *exclusive),
            KeyRange::Bound {
                lower,
                upper,
                lower_exclusive,
                upper_exclusive,
            } => above(lower, *lower_exclusive) && below(upper, *upper_exclusive),
        }
    }

    /// Maps the keys of this range.
    pub fn map<T>(self, mut f: impl FnMut(K) -> T) -> KeyRange<T> {
        match self {
            KeyRange::All => KeyRange::All,
            KeyRange::Only(k) => KeyRange::Only(f(k)),
            KeyRange::LowerBound { value, exclusive } => KeyRange::LowerBound {
                value: f(value),
                exclusive,
            },
            KeyRange::UpperBound { value, exclusive } => KeyRange::UpperBound {
                value: f(value),
                exclusive,
            },
            KeyRange::Bound {
                lower,
                upper,
                lower_exclusive,
                upper_exclusive,
            } => KeyRange::Bound {
                lower: f(lower),
                upper: f(upper),
                lower_exclusive,
                upper_exclusive,
            },
        }
    }
}
