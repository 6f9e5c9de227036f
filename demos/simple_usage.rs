// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Simple example of embedding doclite in a Rust application
//!
//! Declares two document variants, stores a few documents, follows a
//! reference both ways and runs some queries.
//!
//! Run with: cargo run --example simple_usage

use doclite::{
    open_storage, DataType, DefaultValue, Document, Length, Required, SchemaBuilder,
    StorageConfig, Value,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    println!("=== Doclite Simple Usage Example ===\n");

    println!("1. Opening storage...");
    let storage = open_storage(&StorageConfig::memory())?;
    println!("   ✓ {:?}\n", storage);

    println!("2. Declaring document variants...");
    let author = SchemaBuilder::new("Author")
        .field("name", DataType::Text)
        .validator("name", Required)
        .build();
    let book = SchemaBuilder::new("Book")
        .field("title", DataType::Text)
        .field("year", DataType::Int)
        .field("author", DataType::Reference(author.clone()))
        .validator("title", Required)
        .validator("title", Length::at_most(200))
        .default("year", DefaultValue::constant(1970))
        .build();
    for relation in author.back_relations() {
        println!("   ✓ Author gained relation {}", relation.name);
    }
    println!();

    println!("3. Saving documents...");
    let mut knuth = Document::with_fields(&author, [("name", "Donald Knuth")])?;
    knuth.save_with(&storage, false)?;
    for (title, year) in [
        ("Fundamental Algorithms", 1968),
        ("Seminumerical Algorithms", 1969),
        ("Sorting and Searching", 1973),
    ] {
        let mut doc = Document::with_fields(
            &book,
            [("title", Value::from(title)), ("year", Value::from(year))],
        )?;
        doc.set("author", knuth.clone())?;
        let key = doc.save_with(&storage, false)?;
        println!("   ✓ Saved {} as {}", title, key);
    }

    let mut untitled = Document::new(book.clone());
    match untitled.save_with(&storage, false) {
        Ok(_) => println!("   ✗ Untitled book was saved"),
        Err(e) => println!("   ✓ Untitled book rejected: {}", e),
    }
    println!();

    println!("4. Querying...");
    let seventies = storage.find(&book, [("year__gte", 1970)])?;
    println!("   → Books from the seventies: {:?}", seventies);
    let ordered = storage.all(&book)?.order_by(["year"], true)?;
    if let Some(mut latest) = ordered.first()? {
        println!("   → Latest book:\n{}", latest.dump(false)?);
    }
    let years: Vec<String> = storage
        .all(&book)?
        .values("year")
        .map(|year| year.map(|year| year.to_string()))
        .collect::<Result<_, _>>()?;
    println!("   → Distinct years: {}", years.join(", "));
    println!();

    println!("5. Following references...");
    let books = knuth.related("book_set")?;
    for doc in &books {
        let mut doc = doc?;
        let writer = doc.get("author")?;
        println!(
            "   → {} by {}",
            doc.get("title")?,
            writer
                .as_document()
                .and_then(|writer| writer.raw("name"))
                .unwrap_or(&Value::Null)
        );
    }

    println!("\n=== Example completed successfully ===");
    Ok(())
}
