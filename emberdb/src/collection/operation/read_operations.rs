use super::index_operations::IndexOperations;
use crate::collection::{Document, FindOptions, RecordId};
use crate::common::{build_collator, DocumentCursor, FilteredStream, IndexedStream, RecordStream};
use crate::errors::EmberResult;
use crate::filter::{is_all_filter, is_logical_filter, Filter};
use crate::index::IndexLookup;
use crate::store::DocumentMap;
use std::collections::BTreeSet;
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct ReadOperations {
    inner: Arc<ReadOperationsInner>,
}

impl ReadOperations {
    pub fn new(collection_name: &str, document_map: DocumentMap, index_operations: IndexOperations) -> Self {
        ReadOperations {
            inner: Arc::new(ReadOperationsInner {
                collection_name: collection_name.to_string(),
                document_map,
                index_operations,
            }),
        }
    }
}

impl Deref for ReadOperations {
    type Target = Arc<ReadOperationsInner>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub(crate) struct ReadOperationsInner {
    collection_name: String,
    document_map: DocumentMap,
    index_operations: IndexOperations,
}

impl ReadOperationsInner {
    /// Prepares `filter` and returns a cursor over the matching documents.
    ///
    /// No filter, or the `all()` filter, walks the whole collection. A
    /// top-level leaf answered by an index iterates the index result
    /// directly; anything else is a scan where indexed leaves answer from
    /// their cached ids.
    pub fn find(&self, filter: Option<Filter>) -> EmberResult<DocumentCursor> {
        let stream: RecordStream = match filter {
            None => Box::new(self.document_map.entries()),
            Some(filter) if is_all_filter(&filter) => Box::new(self.document_map.entries()),
            Some(filter) => {
                self.prepare(&filter)?;
                match filter.cached_ids() {
                    Some(ids) if !is_logical_filter(&filter) => {
                        log::debug!("Answering {} from its index", filter);
                        Box::new(IndexedStream::new(ids, self.document_map.clone()))
                    }
                    _ => Box::new(FilteredStream::new(Box::new(self.document_map.entries()), filter)),
                }
            }
        };
        Ok(DocumentCursor::new(stream))
    }

    /// [ReadOperationsInner::find] followed by the sort and pagination of
    /// `options`.
    pub fn find_with_options(&self, filter: Option<Filter>, options: &FindOptions) -> EmberResult<DocumentCursor> {
        let mut cursor = self.find(filter)?;

        if !options.order_by.is_empty() {
            let collator = if options.uses_collator() {
                Some(build_collator(
                    options.collator_preferences.clone().unwrap_or_default(),
                    options.collator_options.clone().unwrap_or_default(),
                )?)
            } else {
                None
            };

            // stable sorts from the last key to the first give a lexicographic order
            for (field, order) in options.order_by.iter().rev() {
                cursor = cursor.sort(field, *order, collator.as_ref(), options.null_order)?;
            }
        }

        if options.skip.is_some() || options.limit.is_some() {
            cursor = cursor.skip_limit(options.skip.unwrap_or(0), options.limit.unwrap_or(i64::MAX))?;
        }
        Ok(cursor)
    }

    pub fn get_by_id(&self, id: &RecordId) -> EmberResult<Option<Document>> {
        self.document_map.get(id)
    }

    /// Binds `filter` to this collection and asks the indexes of its leaves
    /// for their matching ids.
    fn prepare(&self, filter: &Filter) -> EmberResult<()> {
        filter.set_collection_name(self.collection_name.clone())?;

        if is_logical_filter(filter) {
            for child in filter.logical_filters()? {
                self.prepare(&child)?;
            }
            return Ok(());
        }

        if !filter.has_field() {
            return Ok(());
        }

        let ids = match filter.index_lookup() {
            Some(lookup) => self.lookup_index(&filter.get_field_name()?, &lookup)?,
            None => None,
        };
        filter.set_index_ids(ids);
        Ok(())
    }

    fn lookup_index(&self, field: &str, lookup: &IndexLookup) -> EmberResult<Option<BTreeSet<RecordId>>> {
        let entry = match self.index_operations.find_index_entry(field)? {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if !self.index_operations.is_index_usable(field)? {
            // text search has no scan fallback, a stale answer beats none
            if !matches!(lookup, IndexLookup::Text(_)) {
                log::debug!("Index {} is not usable, falling back to scan", entry);
                return Ok(None);
            }
            log::warn!("Answering text search from index {} while it is not clean", entry);
        }

        self.index_operations.find_by_lookup(&entry, lookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::order_by;
    use crate::common::{CollectionEventBus, NullOrder, SortOrder};
    use crate::doc;
    use crate::engine_config::EngineConfig;
    use crate::errors::ErrorKind;
    use crate::filter::{all, field};
    use crate::index::IndexType;
    use crate::Value;

    struct Fixture {
        config: EngineConfig,
        map: DocumentMap,
        index_operations: IndexOperations,
        read_operations: ReadOperations,
    }

    fn setup(name: &str) -> Fixture {
        let config = EngineConfig::new();
        let map = config.store().open_map(name).unwrap();
        let index_operations = IndexOperations::new(name, config.clone(), map.clone(), CollectionEventBus::new());
        let read_operations = ReadOperations::new(name, map.clone(), index_operations.clone());
        Fixture {
            config,
            map,
            index_operations,
            read_operations,
        }
    }

    fn store(fixture: &Fixture, key: u64, document: Document) {
        let id = RecordId::create_id(key);
        fixture.map.put(id, document.clone()).unwrap();
        fixture.index_operations.write_index(&document, id).unwrap();
    }

    fn people(fixture: &Fixture) {
        store(fixture, 1, doc! { name: "Alice", age: 30, tags: ["a", "b"] });
        store(fixture, 2, doc! { name: "Bob", age: 25 });
        store(fixture, 3, doc! { name: "Carol", age: 30, tags: ["b"] });
        store(fixture, 4, doc! { name: "Dave" });
        store(fixture, 5, doc! { name: "Eve", age: "thirty" });
    }

    fn ids(cursor: &mut DocumentCursor) -> Vec<u64> {
        cursor
            .iter_with_id()
            .map(|item| item.unwrap().0.id_value())
            .collect()
    }

    fn query(fixture: &Fixture, filter: Filter) -> Vec<u64> {
        let mut cursor = fixture.read_operations.find(Some(filter)).unwrap();
        let mut found = ids(&mut cursor);
        found.sort();
        found
    }

    fn filters() -> Vec<Filter> {
        vec![
            field("age").eq(30),
            field("age").ne(30),
            field("age").gt(25),
            field("age").lte(30),
            field("age").between(26, 40),
            field("age").in_array(vec![25, 99]),
            field("age").not_in(vec![25]),
            field("tags").eq("b"),
            field("tags").in_array(vec!["a"]),
            field("age").eq(30).and(field("name").eq("Carol")),
            field("age").eq(25).or(field("tags").eq("a")),
            field("age").eq(30).not(),
        ]
    }

    #[test]
    fn test_index_and_scan_agree() {
        let scanned = setup("scan_agree");
        people(&scanned);
        let indexed = setup("index_agree");
        indexed.index_operations.create_index("age", IndexType::NonUnique, false).unwrap();
        indexed.index_operations.create_index("tags", IndexType::NonUnique, false).unwrap();
        people(&indexed);

        for filter in filters() {
            let description = filter.to_string();
            assert_eq!(query(&scanned, filter.clone()), query(&indexed, filter), "{}", description);
        }
    }

    #[test]
    fn test_index_and_scan_agree_past_float_precision() {
        let two_pow_53 = 9_007_199_254_740_992_i64;
        let scanned = setup("scan_precision");
        let indexed = setup("index_precision");
        indexed.index_operations.create_index("n", IndexType::NonUnique, false).unwrap();
        for fixture in [&scanned, &indexed] {
            store(fixture, 1, doc! { n: two_pow_53 });
            store(fixture, 2, doc! { n: (two_pow_53 + 1) });
        }

        for filter in [
            field("n").eq(two_pow_53 as f64),
            field("n").gt(two_pow_53 as f64),
            field("n").lte(two_pow_53),
        ] {
            let description = filter.to_string();
            assert_eq!(query(&scanned, filter.clone()), query(&indexed, filter), "{}", description);
        }
        assert_eq!(query(&indexed, field("n").eq(two_pow_53 as f64)), vec![1]);
        assert_eq!(query(&indexed, field("n").gt(two_pow_53 as f64)), vec![2]);
    }

    #[test]
    fn test_equality_results() {
        let fixture = setup("equality");
        fixture.index_operations.create_index("age", IndexType::NonUnique, false).unwrap();
        people(&fixture);
        assert_eq!(query(&fixture, field("age").eq(30)), vec![1, 3]);
        assert_eq!(query(&fixture, field("tags").eq("b")), vec![1, 3]);
        assert_eq!(query(&fixture, field("age").eq(())), vec![4]);
    }

    #[test]
    fn test_top_level_indexed_leaf_uses_index_ids() {
        let fixture = setup("indexed_leaf");
        fixture.index_operations.create_index("age", IndexType::NonUnique, false).unwrap();
        people(&fixture);

        let filter = field("age").eq(30);
        fixture.read_operations.find(Some(filter.clone())).unwrap();
        assert!(filter.is_field_indexed());
        assert_eq!(filter.get_collection_name().unwrap(), "indexed_leaf");
    }

    #[test]
    fn test_filter_follows_the_collection_it_runs_on() {
        let users = setup("users_reuse");
        let staff = setup("staff_reuse");
        people(&users);
        people(&staff);

        let filter = field("name").eq("Bob");
        assert_eq!(query(&users, filter.clone()), vec![2]);
        assert_eq!(filter.get_collection_name().unwrap(), "users_reuse");
        assert_eq!(query(&staff, filter.clone()), vec![2]);
        assert_eq!(filter.get_collection_name().unwrap(), "staff_reuse");
    }

    #[test]
    fn test_logical_children_are_prepared() {
        let fixture = setup("logical");
        fixture.index_operations.create_index("age", IndexType::NonUnique, false).unwrap();
        people(&fixture);

        let indexed = field("age").eq(30);
        let scanned = field("name").eq("Alice");
        let filter = indexed.clone().and(scanned.clone().not());
        assert_eq!(query(&fixture, filter), vec![3]);
        assert!(indexed.is_field_indexed());
        assert!(!scanned.is_field_indexed());
        assert_eq!(scanned.get_collection_name().unwrap(), "logical");
    }

    #[test]
    fn test_dirty_index_falls_back_to_scan() {
        let fixture = setup("dirty_scan");
        fixture.index_operations.create_index("age", IndexType::NonUnique, false).unwrap();
        people(&fixture);

        // an interrupted rebuild leaves the catalog dirty and the index stale
        fixture.config.index_catalog().begin_indexing("dirty_scan", "age").unwrap();
        fixture.map.put(RecordId::create_id(6), doc! { age: 30 }).unwrap();
        assert!(!fixture.index_operations.is_index_usable("age").unwrap());

        let filter = field("age").eq(30);
        assert_eq!(query(&fixture, filter.clone()), vec![1, 3, 6]);
        assert!(!filter.is_field_indexed());
    }

    #[test]
    fn test_filter_can_be_reused() {
        let fixture = setup("reuse");
        people(&fixture);
        let filter = field("age").eq(30);
        assert_eq!(query(&fixture, filter.clone()), vec![1, 3]);

        fixture.index_operations.create_index("age", IndexType::NonUnique, false).unwrap();
        assert_eq!(query(&fixture, filter.clone()), vec![1, 3]);
        assert!(filter.is_field_indexed());

        fixture.index_operations.drop_index("age").unwrap();
        assert_eq!(query(&fixture, filter.clone()), vec![1, 3]);
        assert!(!filter.is_field_indexed());
    }

    #[test]
    fn test_all_and_no_filter() {
        let fixture = setup("all");
        people(&fixture);
        let mut cursor = fixture.read_operations.find(None).unwrap();
        assert_eq!(ids(&mut cursor), vec![1, 2, 3, 4, 5]);
        let mut cursor = fixture.read_operations.find(Some(all())).unwrap();
        assert_eq!(cursor.size(), 5);
    }

    #[test]
    fn test_text_search() {
        let fixture = setup("text");
        store(&fixture, 1, doc! { bio: "Loves hiking and Rust" });
        store(&fixture, 2, doc! { bio: "rusty bikes" });

        let err = fixture
            .read_operations
            .find(Some(field("bio").text("rust")))
            .unwrap()
            .to_vec()
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::FilterError);

        fixture.index_operations.create_index("bio", IndexType::Fulltext, false).unwrap();
        assert_eq!(query(&fixture, field("bio").text("rust")), vec![1]);
        assert_eq!(query(&fixture, field("bio").text("rust*")), vec![1, 2]);
    }

    #[test]
    fn test_deleted_documents_are_skipped() {
        let fixture = setup("deleted");
        fixture.index_operations.create_index("age", IndexType::NonUnique, false).unwrap();
        people(&fixture);

        let mut cursor = fixture.read_operations.find(Some(field("age").eq(30))).unwrap();
        fixture.map.remove(&RecordId::create_id(1)).unwrap();
        assert_eq!(ids(&mut cursor), vec![3]);
    }

    #[test]
    fn test_get_by_id() {
        let fixture = setup("by_id");
        people(&fixture);
        let found = fixture.read_operations.get_by_id(&RecordId::create_id(2)).unwrap();
        assert_eq!(found.unwrap().get("name").unwrap(), Value::from("Bob"));
        assert!(fixture.read_operations.get_by_id(&RecordId::create_id(99)).unwrap().is_none());
    }

    #[test]
    fn test_find_with_options() {
        let fixture = setup("options");
        store(&fixture, 1, doc! { team: "red", score: 3 });
        store(&fixture, 2, doc! { team: "blue", score: 5 });
        store(&fixture, 3, doc! { team: "red", score: 9 });
        store(&fixture, 4, doc! { score: 1 });
        store(&fixture, 5, doc! { team: "blue", score: 2 });

        let options = order_by("team", SortOrder::Ascending)
            .then_by("score", SortOrder::Descending)
            .null_order(NullOrder::Last);
        let mut cursor = fixture.read_operations.find_with_options(None, &options).unwrap();
        assert_eq!(ids(&mut cursor), vec![2, 5, 3, 1, 4]);

        let paged = options.clone().skip(1).limit(2);
        let mut cursor = fixture.read_operations.find_with_options(None, &paged).unwrap();
        assert_eq!(ids(&mut cursor), vec![5, 3]);

        let err = fixture
            .read_operations
            .find_with_options(None, &FindOptions::new().skip(-1))
            .err()
            .unwrap();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }
}
