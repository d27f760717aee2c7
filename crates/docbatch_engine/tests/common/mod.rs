//! Helpers shared by the engine integration tests.
#![allow(dead_code)]

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use docbatch_engine::{DocumentMerger, EventSink, MergeSession, RunEvent};
use lopdf::{Dictionary, Document, Object, Stream};

#[derive(Default)]
pub struct TestSink {
    pub events: Arc<Mutex<Vec<RunEvent>>>,
}

impl TestSink {
    pub fn lines(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                RunEvent::Log(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for TestSink {
    fn emit(&self, event: RunEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Byte concatenation; makes input order visible in the output bytes.
pub struct ConcatMerger;

struct ConcatSession(Vec<u8>);

impl DocumentMerger for ConcatMerger {
    fn begin(&self) -> Box<dyn MergeSession> {
        Box::new(ConcatSession(Vec::new()))
    }
}

impl MergeSession for ConcatSession {
    fn append(&mut self, input: &Path) -> io::Result<()> {
        let bytes = fs::read(input)?;
        self.0.extend(bytes);
        Ok(())
    }

    fn finish(self: Box<Self>, output: &mut dyn Write) -> io::Result<()> {
        output.write_all(&self.0)
    }
}

/// A one-page PDF whose content stream shows `label`. The media box sits on
/// the page tree node, so the page only has it by inheritance.
pub fn one_page_pdf(label: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let content = format!("BT /F1 12 Tf 10 10 Td ({label}) Tj ET");
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(pages_id));
    page.set("Contents", Object::Reference(content_id));
    let page_id = doc.add_object(page);

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
    pages.set("Count", Object::Integer(1));
    pages.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(200),
            Object::Integer(200),
        ]),
    );
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Content stream text of every page, in page order.
pub fn page_contents(path: &Path) -> Vec<String> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .into_values()
        .map(|page_id| String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned())
        .collect()
}

/// Whether every page of the document at `path` carries a media box.
pub fn every_page_has_media_box(path: &Path) -> bool {
    let doc = Document::load(path).unwrap();
    doc.get_pages().into_values().all(|page_id| {
        doc.get_dictionary(page_id)
            .map(|page| page.has(b"MediaBox"))
            .unwrap_or(false)
    })
}
