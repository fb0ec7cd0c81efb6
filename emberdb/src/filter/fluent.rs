use crate::Value;

use super::{
    ComparisonFilter, ComparisonOp, EqualsFilter, Filter, InFilter, NotEqualsFilter, NotInFilter,
    RegexFilter, TextFilter,
};

/// Starts a filter on `field_name`.
///
/// ```rust,ignore
/// use emberdb::filter::field;
///
/// let filter = field("age").gt(18);
/// let filter = field("tags").in_array(vec!["red", "blue"]);
/// let filter = field("bio").text("rust*");
/// ```
pub fn field(field_name: &str) -> FluentFilter {
    FluentFilter {
        field_name: field_name.to_string(),
    }
}

/// Builder returned by [field]. Every method consumes the builder and
/// returns a finished [Filter].
pub struct FluentFilter {
    field_name: String,
}

impl FluentFilter {
    /// Field equals `value`. Array fields match when any element equals it.
    #[inline]
    pub fn eq<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(EqualsFilter::new(self.field_name, value.into()))
    }

    #[inline]
    pub fn ne<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(NotEqualsFilter::new(self.field_name, value.into()))
    }

    #[inline]
    pub fn gt<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(ComparisonFilter::new(self.field_name, value.into(), ComparisonOp::Greater))
    }

    #[inline]
    pub fn gte<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(ComparisonFilter::new(self.field_name, value.into(), ComparisonOp::GreaterEqual))
    }

    #[inline]
    pub fn lt<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(ComparisonFilter::new(self.field_name, value.into(), ComparisonOp::Lesser))
    }

    #[inline]
    pub fn lte<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(ComparisonFilter::new(self.field_name, value.into(), ComparisonOp::LesserEqual))
    }

    /// Inclusive range, `lower <= field <= upper`.
    pub fn between<T: Into<Value>>(self, lower: T, upper: T) -> Filter {
        let lower = Filter::new(ComparisonFilter::new(
            self.field_name.clone(),
            lower.into(),
            ComparisonOp::GreaterEqual,
        ));
        let upper = Filter::new(ComparisonFilter::new(self.field_name, upper.into(), ComparisonOp::LesserEqual));
        lower.and(upper)
    }

    #[inline]
    pub fn in_array<T: Into<Value>>(self, values: Vec<T>) -> Filter {
        Filter::new(InFilter::new(self.field_name, values.into_iter().map(Into::into).collect()))
    }

    #[inline]
    pub fn not_in<T: Into<Value>>(self, values: Vec<T>) -> Filter {
        Filter::new(NotInFilter::new(self.field_name, values.into_iter().map(Into::into).collect()))
    }

    /// Full-text search; the field needs a full-text index.
    #[inline]
    pub fn text(self, term: &str) -> Filter {
        Filter::new(TextFilter::new(self.field_name, term.to_string()))
    }

    #[inline]
    pub fn text_regex(self, pattern: &str) -> Filter {
        Filter::new(RegexFilter::new(self.field_name, pattern.to_string()))
    }
}
