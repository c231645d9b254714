//! Human and JSON rendering for command results.

use notesearch::error::Result;
use notesearch::{Document, IndexStats, Results, SearchResponse};
use serde::Serialize;

/// Print any serializable value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn find_human(results: &Results) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    let offset = results.query.offset;
    for (i, r) in results.items.iter().enumerate() {
        println!("{:>3}. [{:.3}] {}", offset + i + 1, r.score, r.document.path);
        if !r.document.title.is_empty() {
            println!("     {}", r.document.title);
        }
    }
    if results.total as usize > results.items.len() {
        println!(
            "\n{} of {} result(s)",
            results.items.len(),
            results.total
        );
    } else {
        println!("\n{} result(s)", results.items.len());
    }
}

pub fn search_human(response: &SearchResponse) {
    for (i, hit) in response.hits.iter().enumerate() {
        println!(
            "{:>3}. [{:.3}] {} ({})",
            i + 1,
            hit.score,
            hit.document.path,
            hit.match_type
        );
        if !hit.document.title.is_empty() {
            println!("     {}", hit.document.title);
        }
        if let Some(why) = &hit.explanation {
            println!("     Why: {why}");
        }
    }
    println!("\n{} result(s)", response.hits.len());
}

pub fn document_human(doc: &Document) {
    println!("Path: {}", doc.path);
    if !doc.title.is_empty() {
        println!("Title: {}", doc.title);
    }
    if !doc.tags.is_empty() {
        let tags: Vec<&str> = doc.tags.iter().map(String::as_str).collect();
        println!("Tags: {}", tags.join(", "));
    }
    if let Some(created) = doc.created {
        println!("Created: {}", created.to_rfc3339());
    }
    if let Some(modified) = doc.modified {
        println!("Modified: {}", modified.to_rfc3339());
    }
    for (key, value) in &doc.metadata {
        match value {
            serde_json::Value::String(s) => println!("{key}: {s}"),
            other => println!("{key}: {other}"),
        }
    }
    println!();
    println!("{}", doc.body);
}

pub fn stats_human(stats: &IndexStats) {
    println!("Status: {}", stats.status);
    println!("Documents: {}", stats.document_count);
    println!("Index size: {} bytes", stats.index_size);
    match &stats.index_path {
        Some(path) => println!("Index path: {}", path.display()),
        None => println!("Index path: (in memory)"),
    }
    match stats.last_indexed {
        Some(at) => println!("Last indexed: {}", at.to_rfc3339()),
        None => println!("Last indexed: never (this session)"),
    }
}
