//! Test fixture for doclite integration tests
//!
//! Provides isolated storages, the sample variants the tests share and a
//! backend wrapper counting how often searches actually run.

use doclite::query::{Combinator, Cursor, SortSpec};
use doclite::{
    Backend, ConverterRegistry, DataType, DefaultValue, Document, Key, Length, MemoryBackend,
    QueryAdapter, Record, Required, Schema, SchemaBuilder, Storage, StorageConfig, StorageResult,
    StorageType, Value,
};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

static LOGGING: Once = Once::new();

/// Route `log` output through env_logger once per test binary
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Test fixture with an isolated storage
pub struct TestFixture {
    pub storage: Arc<Storage>,
    searches: Option<Arc<AtomicUsize>>,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestFixture {
    /// Fresh in-memory storage
    pub fn memory() -> Self {
        init_logging();
        let storage = doclite::open_storage(&StorageConfig::memory()).expect("open memory storage");
        Self {
            storage,
            searches: None,
            _temp_dir: None,
        }
    }

    /// In-memory storage whose searches are counted
    pub fn counting() -> Self {
        init_logging();
        let searches = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            inner: MemoryBackend::new(),
            searches: searches.clone(),
        };
        Self {
            storage: Storage::open(backend).expect("open counting storage"),
            searches: Some(searches),
            _temp_dir: None,
        }
    }

    /// Sled storage in a temporary directory
    pub fn sled() -> Self {
        init_logging();
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let storage = doclite::open_storage(&StorageConfig::sled(temp_dir.path().join("db")))
            .expect("open sled storage");
        Self {
            storage,
            searches: None,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Number of backend searches run so far (counting fixtures only)
    pub fn searches(&self) -> usize {
        self.searches
            .as_ref()
            .map_or(0, |searches| searches.load(Ordering::SeqCst))
    }

    /// Save a new document built from `fields`
    pub fn insert<I, K, V>(&self, schema: &Arc<Schema>, fields: I) -> Document
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut doc = Document::with_fields(schema, fields).expect("build document");
        doc.save_with(&self.storage, false).expect("save document");
        doc
    }

    /// Five people with names, ages and cities
    pub fn with_people(&self) -> Arc<Schema> {
        let person = person();
        for (name, age, city) in [
            ("Ada", 36, "London"),
            ("Grace", 85, "New York"),
            ("Alan", 41, "London"),
            ("Edsger", 72, "Rotterdam"),
            ("Barbara", 87, "Los Angeles"),
        ] {
            self.insert(
                &person,
                [
                    ("name", Value::from(name)),
                    ("age", Value::from(age)),
                    ("city", Value::from(city)),
                ],
            );
        }
        person
    }
}

/// `Person`: required name, optional age and city
pub fn person() -> Arc<Schema> {
    SchemaBuilder::new("Person")
        .field("name", DataType::Text)
        .field("age", DataType::Int)
        .field("city", DataType::Text)
        .field("born", DataType::Date)
        .validator("name", Required)
        .validator("name", Length::at_most(50))
        .build()
}

/// `Author` and a `Book` variant referencing it
pub fn library() -> (Arc<Schema>, Arc<Schema>) {
    let author = SchemaBuilder::new("Author")
        .field("name", DataType::Text)
        .validator("name", Required)
        .build();
    let book = SchemaBuilder::new("Book")
        .field("title", DataType::Text)
        .field("author", DataType::Reference(author.clone()))
        .field("pages", DataType::Int)
        .validator("title", Required)
        .default("pages", DefaultValue::constant(100))
        .build();
    (author, book)
}

/// Memory backend counting the searches its queries run
pub struct CountingBackend {
    inner: MemoryBackend,
    searches: Arc<AtomicUsize>,
}

impl Backend for CountingBackend {
    fn storage_type(&self) -> StorageType {
        self.inner.storage_type()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn connect(&mut self) -> StorageResult<()> {
        self.inner.connect()
    }

    fn disconnect(&mut self) -> StorageResult<()> {
        self.inner.disconnect()
    }

    fn get(&self, key: &str) -> StorageResult<Option<Record>> {
        self.inner.get(key)
    }

    fn save(&self, key: Option<Key>, record: Record) -> StorageResult<Option<Key>> {
        self.inner.save(key, record)
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key)
    }

    fn clear(&self) -> StorageResult<()> {
        self.inner.clear()
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        self.inner.contains(key)
    }

    fn keys(&self) -> StorageResult<Vec<Key>> {
        self.inner.keys()
    }

    fn len(&self) -> StorageResult<usize> {
        self.inner.len()
    }

    fn default_converters(&self) -> ConverterRegistry {
        self.inner.default_converters()
    }

    fn query(&self) -> StorageResult<Box<dyn QueryAdapter>> {
        Ok(Box::new(CountingQuery {
            inner: self.inner.query()?,
            searches: self.searches.clone(),
        }))
    }
}

struct CountingQuery {
    inner: Box<dyn QueryAdapter>,
    searches: Arc<AtomicUsize>,
}

impl CountingQuery {
    fn wrap(&self, inner: Box<dyn QueryAdapter>) -> Box<dyn QueryAdapter> {
        Box::new(CountingQuery {
            inner,
            searches: self.searches.clone(),
        })
    }
}

impl QueryAdapter for CountingQuery {
    fn refine(
        &self,
        conditions: &[(String, Value)],
        negate: bool,
        to_db: &dyn Fn(Value) -> StorageResult<Value>,
    ) -> StorageResult<Box<dyn QueryAdapter>> {
        Ok(self.wrap(self.inner.refine(conditions, negate, to_db)?))
    }

    fn order_by(&self, sort: SortSpec) -> StorageResult<Box<dyn QueryAdapter>> {
        Ok(self.wrap(self.inner.order_by(sort)?))
    }

    fn search(&self) -> StorageResult<Cursor> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search()
    }

    fn delete(&self) -> StorageResult<usize> {
        self.inner.delete()
    }

    fn combine(
        &self,
        other: &dyn QueryAdapter,
        combinator: Combinator,
    ) -> StorageResult<Box<dyn QueryAdapter>> {
        let other = match other.as_any().downcast_ref::<CountingQuery>() {
            Some(counting) => counting.inner.as_ref(),
            None => other,
        };
        Ok(self.wrap(self.inner.combine(other, combinator)?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
