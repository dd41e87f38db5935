#![allow(dead_code)]

use std::cell::RefCell;
use std::sync::{Arc, Once};

use log::{LevelFilter, Log, Metadata, Record};

use catalog_query::index::{MemoryFieldIndex, MemoryTextIndex};
use catalog_query::{
    Catalog, CatalogLocator, Context, Document, IndexRef, MemoryRegistry, ResultView,
};

pub fn f1() -> IndexRef {
    IndexRef::new("catalog1", "f1")
}

pub fn f2() -> IndexRef {
    IndexRef::new("catalog1", "f2")
}

pub fn t1() -> IndexRef {
    IndexRef::new("catalog1", "t1")
}

pub struct Fixture {
    pub registry: Arc<MemoryRegistry>,
    pub locator: Arc<CatalogLocator>,
    pub catalog: Arc<Catalog>,
}

impl Fixture {
    /// Six documents with external ids "1" to "6":
    ///
    /// | id | f1 | f2 | t1                |
    /// |----|----|----|-------------------|
    /// | 1  | a  | b  | apple banana      |
    /// | 2  | a  | c  | apple cherry      |
    /// | 3  | X  | c  | banana cherry     |
    /// | 4  | a  | b  | apple             |
    /// | 5  | X  | b  | banana            |
    /// | 6  | Y  | Z  | cherry date       |
    pub fn new() -> Self {
        let registry = Arc::new(MemoryRegistry::new());
        let f1 = MemoryFieldIndex::new("f1");
        let f2 = MemoryFieldIndex::new("f2");
        let t1 = MemoryTextIndex::new("t1");

        let rows = [
            ("1", "a", "b", "apple banana"),
            ("2", "a", "c", "apple cherry"),
            ("3", "X", "c", "banana cherry"),
            ("4", "a", "b", "apple"),
            ("5", "X", "b", "banana"),
            ("6", "Y", "Z", "cherry date"),
        ];
        for (name, v1, v2, text) in rows {
            let document = Document::new_with_id(name)
                .add_field("f1", v1)
                .add_field("f2", v2)
                .add_text("t1", text);
            let id = registry.register(document).unwrap();
            f1.index_doc(id, v1);
            f2.index_doc(id, v2);
            t1.index_doc(id, text);
        }

        let catalog = Arc::new(Catalog::new());
        catalog.add_index(Arc::new(f1));
        catalog.add_index(Arc::new(f2));
        catalog.add_index(Arc::new(t1));
        let locator = Arc::new(CatalogLocator::new(registry.clone()));
        locator.add_catalog("catalog1", catalog.clone());

        Fixture {
            registry,
            locator,
            catalog,
        }
    }

    pub fn context(&self) -> Context {
        Context::new(self.locator.clone())
    }
}

/// External ids of the selected documents in result order.
pub fn external_ids(view: &ResultView) -> Vec<u32> {
    view.iter()
        .map(|doc| {
            doc.unwrap()
                .id
                .and_then(|id| id.parse().ok())
                .unwrap()
        })
        .collect()
}

/// External ids of the selected documents, sorted.
pub fn display(view: &ResultView) -> Vec<u32> {
    let mut ids = external_ids(view);
    ids.sort_unstable();
    ids
}

thread_local! {
    static CAPTURED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Keeps timing report records per test thread.
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().ends_with("::timing")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            CAPTURED.with(|lines| lines.borrow_mut().push(record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Run `f`, returning the timing report lines it logged on this thread.
pub fn capture_timing_report<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Info);
        }
    });
    CAPTURED.with(|lines| lines.borrow_mut().clear());
    let value = f();
    let lines = CAPTURED.with(|lines| lines.take());
    (value, lines)
}
