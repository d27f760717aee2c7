use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use docbatch_core::{Group, RunMode};
use lopdf::{Dictionary, Document, Object, ObjectId};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::persist::{PartialFile, PersistError, PARTIAL_PREFIX};
use crate::sink::EventSink;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("could not list folder {path}: {source}")]
    List { path: PathBuf, source: io::Error },
    #[error("could not write compiled output: {0}")]
    Output(#[from] PersistError),
}

/// Builds one compiled document out of a group's inputs.
pub trait DocumentMerger: Send + Sync {
    fn begin(&self) -> Box<dyn MergeSession>;
}

/// One compiled document under construction.
pub trait MergeSession {
    /// Add `input` after the inputs appended so far. A failing input leaves the
    /// session unchanged, so the caller can skip it.
    fn append(&mut self, input: &Path) -> io::Result<()>;

    fn finish(self: Box<Self>, output: &mut dyn Write) -> io::Result<()>;
}

/// PDF merger: appends every page of each input to a single page tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfMerger;

impl DocumentMerger for LopdfMerger {
    fn begin(&self) -> Box<dyn MergeSession> {
        Box::new(LopdfSession::default())
    }
}

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

#[derive(Default)]
struct LopdfSession {
    next_id: u32,
    pages: Vec<(ObjectId, Dictionary)>,
    objects: BTreeMap<ObjectId, Object>,
}

impl MergeSession for LopdfSession {
    fn append(&mut self, input: &Path) -> io::Result<()> {
        let mut doc = Document::load(input).map_err(invalid_pdf)?;
        doc.renumber_objects_with(self.next_id.max(1));

        let mut pages = Vec::new();
        for page_id in doc.get_pages().into_values() {
            let mut page = doc.get_dictionary(page_id).map_err(invalid_pdf)?.clone();
            inherit_attributes(&doc, &mut page);
            pages.push((page_id, page));
        }
        if pages.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "document has no pages"));
        }

        self.next_id = doc.max_id + 1;
        self.pages.extend(pages);
        self.objects.extend(std::mem::take(&mut doc.objects));
        Ok(())
    }

    fn finish(self: Box<Self>, mut output: &mut dyn Write) -> io::Result<()> {
        let LopdfSession {
            next_id,
            pages,
            objects,
        } = *self;
        let pages_id = (next_id.max(1), 0);
        let catalog_id = (pages_id.0 + 1, 0);

        let mut document = Document::with_version("1.5");
        // Old catalogs and page tree nodes are replaced by the ones built below.
        document.objects = objects
            .into_iter()
            .filter(|(_, object)| !matches!(type_of(object), Some(b"Catalog" | b"Pages")))
            .collect();

        let mut kids = Vec::with_capacity(pages.len());
        for (page_id, mut page) in pages {
            page.set("Parent", Object::Reference(pages_id));
            document.objects.insert(page_id, Object::Dictionary(page));
            kids.push(Object::Reference(page_id));
        }

        let mut tree = Dictionary::new();
        tree.set("Type", Object::Name(b"Pages".to_vec()));
        tree.set("Count", Object::Integer(kids.len() as i64));
        tree.set("Kids", Object::Array(kids));
        document.objects.insert(pages_id, Object::Dictionary(tree));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        document.objects.insert(catalog_id, Object::Dictionary(catalog));

        document.trailer.set("Root", Object::Reference(catalog_id));
        document.max_id = catalog_id.0;
        document
            .save_to(&mut output)
            .map_err(|err| io::Error::other(err.to_string()))
    }
}

fn type_of(object: &Object) -> Option<&[u8]> {
    object.as_dict().ok()?.get(b"Type").ok()?.as_name().ok()
}

/// Copy attributes inherited through the page tree onto the page itself, so
/// it keeps them once re-parented.
fn inherit_attributes(doc: &Document, page: &mut Dictionary) {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(node_id) = parent {
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        depth += 1;
        if depth > 64 {
            break;
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
}

fn invalid_pdf(err: lopdf::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err.to_string())
}

/// A resolved merge: inputs already sorted by full path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeJob {
    pub group: Group,
    pub output_path: PathBuf,
    pub files: Vec<PathBuf>,
}

/// `<group>_compiled.<ext>` in destructive mode, `<group>_compiled_<date>.<ext>` otherwise.
pub fn compiled_file_name(group: &Group, mode: RunMode, date: &str, extension: &str) -> String {
    let base = group.folder_name();
    match mode {
        RunMode::Destructive => format!("{base}_compiled.{extension}"),
        RunMode::Incremental => format!("{base}_compiled_{date}.{extension}"),
    }
}

/// Build the merge job for `group`, or `None` when there is nothing to merge.
///
/// Destructive mode takes every file with `extension` in `folder` except the
/// compiled output itself; incremental mode takes exactly `newly_fetched`.
pub fn plan_merge(
    group: &Group,
    folder: &Path,
    mode: RunMode,
    newly_fetched: &[PathBuf],
    date: &str,
    extension: &str,
) -> Result<Option<MergeJob>, MergeError> {
    let output_name = compiled_file_name(group, mode, date, extension);
    let mut files = match mode {
        RunMode::Destructive => folder_documents(folder, extension, &output_name)?,
        RunMode::Incremental => newly_fetched.to_vec(),
    };
    if files.is_empty() {
        return Ok(None);
    }
    sort_inputs(&mut files);
    Ok(Some(MergeJob {
        group: group.clone(),
        output_path: folder.join(output_name),
        files,
    }))
}

/// Merge order: full path string, byte-wise, case-sensitive.
pub fn sort_inputs(files: &mut [PathBuf]) {
    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
}

fn folder_documents(
    folder: &Path,
    extension: &str,
    output_name: &str,
) -> Result<Vec<PathBuf>, MergeError> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(MergeError::List {
                path: folder.to_path_buf(),
                source,
            })
        }
    };
    Ok(entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name != output_name && !name.starts_with(PARTIAL_PREFIX) && !name.starts_with('.')
        })
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some(extension))
        .map(|e| e.path())
        .collect())
}

/// Merge `job.files` into `job.output_path`.
///
/// Returns `Ok(None)` when cancelled between inputs or when no input could be
/// read; the output file is then left as it was.
pub fn run_merge(
    job: &MergeJob,
    merger: &dyn DocumentMerger,
    cancel: &CancellationToken,
    sink: &dyn EventSink,
) -> Result<Option<PathBuf>, MergeError> {
    let folder = job.output_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = job
        .output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    sink.line(format!(
        "Merging {} files for {}...",
        job.files.len(),
        job.group.name
    ));
    let mut session = merger.begin();
    let mut appended = 0usize;
    for input in &job.files {
        if cancel.is_cancelled() {
            sink.line("Merge interrupted by the operator.".to_string());
            return Ok(None);
        }
        match session.append(input) {
            Ok(()) => appended += 1,
            Err(err) => sink.warn_line(format!(
                "ERROR merging {} for {}: {err}",
                input.display(),
                job.group.name
            )),
        }
    }
    if appended == 0 {
        sink.line(format!("No readable files to merge for {}.", job.group.name));
        return Ok(None);
    }

    let mut output = PartialFile::create(folder)?;
    session.finish(&mut output).map_err(PersistError::from)?;
    let path = output.persist(&file_name)?;
    sink.line(format!("Compiled file saved as: {file_name}"));
    Ok(Some(path))
}
