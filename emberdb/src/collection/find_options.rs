use crate::common::{NullOrder, SortOrder};
use icu_collator::options::CollatorOptions;
use icu_collator::CollatorPreferences;

/// Options for ordering and paginating the result of a find.
///
/// Sort fields apply in the order they were added: the first field is the
/// primary key, later fields break its ties. Skip and limit are applied after
/// sorting.
///
/// # Examples
///
/// ```rust,ignore
/// use emberdb::collection::{order_by, FindOptions};
/// use emberdb::SortOrder;
///
/// let options = order_by("age", SortOrder::Descending)
///     .then_by("name", SortOrder::Ascending)
///     .skip(10)
///     .limit(20);
/// ```
#[derive(Clone, Default)]
pub struct FindOptions {
    pub(crate) order_by: Vec<(String, SortOrder)>,
    pub(crate) null_order: NullOrder,
    pub(crate) skip: Option<i64>,
    pub(crate) limit: Option<i64>,
    pub(crate) collator_options: Option<CollatorOptions>,
    pub(crate) collator_preferences: Option<CollatorPreferences>,
}

/// Creates `FindOptions` sorting by one field.
pub fn order_by(field_name: &str, sort_order: SortOrder) -> FindOptions {
    FindOptions::new().then_by(field_name, sort_order)
}

/// Creates `FindOptions` skipping the first `skip` results.
pub fn skip_by(skip: i64) -> FindOptions {
    FindOptions::new().skip(skip)
}

/// Creates `FindOptions` keeping at most `limit` results.
pub fn limit_to(limit: i64) -> FindOptions {
    FindOptions::new().limit(limit)
}

impl FindOptions {
    pub fn new() -> FindOptions {
        FindOptions::default()
    }

    /// Adds a sort field after the ones already present.
    pub fn then_by(mut self, field_name: &str, sort_order: SortOrder) -> FindOptions {
        self.order_by.push((field_name.to_string(), sort_order));
        self
    }

    /// Where documents without a value on a sort field go.
    pub fn null_order(mut self, null_order: NullOrder) -> FindOptions {
        self.null_order = null_order;
        self
    }

    /// Negative values are rejected when the find runs.
    pub fn skip(mut self, skip: i64) -> FindOptions {
        self.skip = Some(skip);
        self
    }

    /// Negative values are rejected when the find runs.
    pub fn limit(mut self, limit: i64) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    /// Compares string sort keys with a collator built from these options.
    pub fn collator_options(mut self, options: CollatorOptions) -> FindOptions {
        self.collator_options = Some(options);
        self
    }

    /// Compares string sort keys with a collator for these locale preferences.
    pub fn collator_preferences(mut self, preferences: CollatorPreferences) -> FindOptions {
        self.collator_preferences = Some(preferences);
        self
    }

    pub fn get_order_by(&self) -> &[(String, SortOrder)] {
        &self.order_by
    }

    pub fn get_null_order(&self) -> NullOrder {
        self.null_order
    }

    pub fn get_skip(&self) -> Option<i64> {
        self.skip
    }

    pub fn get_limit(&self) -> Option<i64> {
        self.limit
    }

    pub(crate) fn uses_collator(&self) -> bool {
        self.collator_options.is_some() || self.collator_preferences.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = FindOptions::new();
        assert!(options.get_order_by().is_empty());
        assert_eq!(options.get_null_order(), NullOrder::Default);
        assert_eq!(options.get_skip(), None);
        assert_eq!(options.get_limit(), None);
        assert!(!options.uses_collator());
    }

    #[test]
    fn test_sort_fields_keep_insertion_order() {
        let options = order_by("age", SortOrder::Descending).then_by("name", SortOrder::Ascending);
        assert_eq!(
            options.get_order_by(),
            &[
                ("age".to_string(), SortOrder::Descending),
                ("name".to_string(), SortOrder::Ascending)
            ]
        );
    }

    #[test]
    fn test_pagination_helpers() {
        assert_eq!(skip_by(5).get_skip(), Some(5));
        assert_eq!(limit_to(7).get_limit(), Some(7));

        let options = skip_by(1).limit(2).null_order(NullOrder::Last);
        assert_eq!(options.get_skip(), Some(1));
        assert_eq!(options.get_limit(), Some(2));
        assert_eq!(options.get_null_order(), NullOrder::Last);
    }

    #[test]
    fn test_collator_settings() {
        let options = FindOptions::new().collator_options(CollatorOptions::default());
        assert!(options.uses_collator());
    }
}
