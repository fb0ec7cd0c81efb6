/// Direction of a sort over a document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest value first.
    Ascending,
    /// Largest value first.
    Descending,
}

/// Placement of documents whose sort field is null or missing.
///
/// `Default` puts nulls first for an ascending sort and last for a
/// descending one. `First` and `Last` override that regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullOrder {
    First,
    Last,
    #[default]
    Default,
}

impl NullOrder {
    /// Whether nulls go in front of the ordered values for the given direction.
    pub fn nulls_first(&self, order: SortOrder) -> bool {
        match self {
            NullOrder::First => true,
            NullOrder::Last => false,
            NullOrder::Default => order == SortOrder::Ascending,
        }
    }
}
