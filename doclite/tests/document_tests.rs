//! Document lifecycle tests: create, save, load, update, delete

#[path = "testutils/mod.rs"]
mod testutils;

use chrono::NaiveDate;
use doclite::{DataType, DefaultValue, Document, Equals, SchemaBuilder, StorageError, Value};
use testutils::test_fixture::{library, person, TestFixture};

#[test]
fn test_round_trip() {
    let fixture = TestFixture::memory();
    let person = person();
    let born = NaiveDate::from_ymd_opt(1815, 12, 10).unwrap();

    let mut ada = Document::with_fields(
        &person,
        [("name", Value::from("Ada")), ("born", Value::from(born))],
    )
    .unwrap();
    let key = ada.save_with(&fixture.storage, false).unwrap();

    let mut loaded = fixture.storage.get(&person, &key).unwrap();
    assert_eq!(loaded, ada);
    assert_eq!(loaded.get("name").unwrap(), Value::from("Ada"));
    assert_eq!(loaded.get("born").unwrap(), Value::from(born));
    assert_eq!(loaded.get("age").unwrap(), Value::Null);

    loaded.set("age", 36).unwrap();
    assert_eq!(loaded.save().unwrap(), key);
    let reloaded = fixture.storage.get(&person, &key).unwrap();
    assert_eq!(reloaded.raw("age"), Some(&Value::Int(36)));
    assert_eq!(fixture.storage.len().unwrap(), 1);
}

#[test]
fn test_required_and_defaults() {
    let fixture = TestFixture::memory();
    let (_, book) = library();

    let mut untitled = Document::new(book.clone());
    match untitled.save_with(&fixture.storage, false) {
        Err(StorageError::Validation(e)) => {
            assert_eq!(e.variant, "Book");
            assert_eq!(e.field, "title");
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(fixture.storage.is_empty().unwrap());

    let mut notes = Document::with_fields(&book, [("title", "Notes")]).unwrap();
    assert_eq!(notes.raw("pages"), Some(&Value::Null));
    notes.save_with(&fixture.storage, false).unwrap();
    assert_eq!(notes.raw("pages"), Some(&Value::Int(100)));
}

#[test]
fn test_produced_defaults_see_the_document() {
    let fixture = TestFixture::memory();
    let counter = std::sync::atomic::AtomicI64::new(0);
    let counter = std::sync::Arc::new(counter);
    let next = counter.clone();
    let ticket = SchemaBuilder::new("Ticket")
        .field("number", DataType::Int)
        .field("summary", DataType::Text)
        .field("label", DataType::Text)
        .default(
            "number",
            DefaultValue::produce(move || {
                Value::Int(next.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1)
            }),
        )
        .default(
            "label",
            DefaultValue::from_document(|doc: &Document| {
                Value::from(format!(
                    "#{}",
                    doc.raw("summary").and_then(Value::as_text).unwrap_or("?")
                ))
            }),
        )
        .build();

    let first = fixture.insert(&ticket, [("summary", "crash")]);
    let second = fixture.insert(&ticket, [("summary", "typo")]);
    assert_eq!(first.raw("number"), Some(&Value::Int(1)));
    assert_eq!(second.raw("number"), Some(&Value::Int(2)));
    assert_eq!(second.raw("label"), Some(&Value::from("#typo")));
}

#[test]
fn test_delete_then_not_found() {
    let fixture = TestFixture::memory();
    let person = person();
    let ada = fixture.insert(&person, [("name", "Ada")]);
    let key = ada.pk().cloned().unwrap();

    ada.delete().unwrap();
    match fixture.storage.get(&person, &key) {
        Err(StorageError::NotFound(keys)) => assert_eq!(keys, vec![key]),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_get_or_create() {
    let fixture = TestFixture::counting();
    let person = person();

    let (ada, created) = fixture
        .storage
        .get_or_create(&person, [("name", "Ada")])
        .unwrap();
    assert!(created);
    assert!(ada.pk().is_some());

    let (again, created) = fixture
        .storage
        .get_or_create(&person, [("name", "Ada")])
        .unwrap();
    assert!(!created);
    assert_eq!(again, ada);
    assert_eq!(fixture.storage.len().unwrap(), 1);
}

#[test]
fn test_back_relation() {
    let fixture = TestFixture::memory();
    let (author, book) = library();
    assert_eq!(author.back_relation("book_set").unwrap().field, "author");

    let ada = fixture.insert(&author, [("name", "Ada")]);
    let alan = fixture.insert(&author, [("name", "Alan")]);
    for (title, writer) in [("Notes", &ada), ("Sketch", &ada), ("Computing", &alan)] {
        let mut doc = Document::with_fields(&book, [("title", title)]).unwrap();
        doc.set("author", writer.clone()).unwrap();
        doc.save_with(&fixture.storage, false).unwrap();
    }

    let books = ada.related("book_set").unwrap();
    let mut titles: Vec<Value> = books
        .iter()
        .map(|doc| doc.unwrap().raw("title").cloned().unwrap())
        .collect();
    titles.sort_by(|a, b| a.sort_cmp(b));
    assert_eq!(titles, vec![Value::from("Notes"), Value::from("Sketch")]);

    let mut computing = alan.related("book_set").unwrap().first().unwrap().unwrap();
    let writer = computing.get("author").unwrap();
    assert_eq!(writer.as_document(), Some(&alan));
}

#[test]
fn test_variant_filters_apply_to_find() {
    let fixture = TestFixture::memory();
    let person = person();
    let londoner = SchemaBuilder::derive("Londoner", &[&person])
        .validator("city", Equals(Value::from("London")))
        .build();
    fixture.with_people();

    let londoners = fixture.storage.all(&londoner).unwrap();
    assert_eq!(londoners.len().unwrap(), 2);
    assert!(londoners
        .iter()
        .all(|doc| doc.unwrap().raw("city") == Some(&Value::from("London"))));
    assert_eq!(fixture.storage.all(&person).unwrap().len().unwrap(), 5);
}

#[test]
fn test_document_moves_between_storages() {
    let first = TestFixture::memory();
    let second = TestFixture::memory();
    let person = person();
    let mut ada = first.insert(&person, [("name", "Ada")]);
    let key = ada.pk().cloned().unwrap();

    let copied = ada.save_with(&second.storage, false).unwrap();
    assert!(second.storage.contains(&copied).unwrap());
    assert!(first.storage.contains(&key).unwrap());

    let mut other = first.storage.get(&person, &key).unwrap();
    let kept = other.save_with(&second.storage, true).unwrap();
    assert_eq!(kept, key);
    assert_eq!(second.storage.len().unwrap(), 2);
}
