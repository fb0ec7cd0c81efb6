/// How an update treats the number of documents its filter matches.
///
/// ```rust,ignore
/// use emberdb::collection::{insert_if_absent, just_once, UpdateOptions};
///
/// // fail instead of touching more than one document
/// collection.update_with_options(field("email").eq("a@b.c"), &patch, &just_once())?;
///
/// // upsert
/// collection.update_with_options(field("email").eq("a@b.c"), &patch, &insert_if_absent())?;
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    insert_if_absent: bool,
    just_once: bool,
}

impl UpdateOptions {
    pub fn new(insert_if_absent: bool, just_once: bool) -> Self {
        Self {
            insert_if_absent,
            just_once,
        }
    }

    /// Whether the update document is inserted when nothing matches.
    pub fn is_insert_if_absent(&self) -> bool {
        self.insert_if_absent
    }

    /// Whether matching more than one document is an error.
    pub fn is_just_once(&self) -> bool {
        self.just_once
    }
}

pub fn insert_if_absent() -> UpdateOptions {
    UpdateOptions::new(true, false)
}

pub fn just_once() -> UpdateOptions {
    UpdateOptions::new(false, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_options_new() {
        let options = UpdateOptions::new(true, false);
        assert!(options.is_insert_if_absent());
        assert!(!options.is_just_once());

        let options = UpdateOptions::new(false, true);
        assert!(!options.is_insert_if_absent());
        assert!(options.is_just_once());
    }

    #[test]
    fn test_update_options_default() {
        let options = UpdateOptions::default();
        assert!(!options.is_insert_if_absent());
        assert!(!options.is_just_once());
    }

    #[test]
    fn test_helpers() {
        assert_eq!(insert_if_absent(), UpdateOptions::new(true, false));
        assert_eq!(just_once(), UpdateOptions::new(false, true));
    }
}
