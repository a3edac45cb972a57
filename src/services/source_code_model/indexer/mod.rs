// Symbol indexer: walks the project tree, partitions the sources, fans out
// to isolated child processes, merges their stores into the project store
// and answers reference queries against it.
//
// The fan-out deliberately uses OS processes rather than threads: the parser
// is treated as an opaque library with hidden per-process state, so each
// child holds a private instance.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::database::{SYMBOL_DB_NAME, SymbolDatabase, SymbolRecord};
use crate::flags::CompilerFlags;
use crate::logging;
use crate::parser::CxxParser;
use crate::parser::ast::{AstKind, VisitResult};
use crate::parser::cache::{CachePolicy, TunitCache};
use crate::protocol::{Reference, ResultData, Value, bool_arg, int_arg, str_arg};

/// Environment override for locating the indexing-child binary.
pub const CHUNK_WORKER_ENV: &str = "CXXD_INDEX_CHUNK";

/// Extensions the directory walk accepts.
pub const SOURCE_EXTENSIONS: &[&str] = &["cpp", "cc", "cxx", "c", "h", "hh", "hpp"];

/// The closed set of kinds the indexer records. Anything else is traversed
/// for descendants but never stored.
pub const SUPPORTED_KINDS: &[AstKind] = &[
    AstKind::Class,
    AstKind::Struct,
    AstKind::Enum,
    AstKind::EnumValue,
    AstKind::Union,
    AstKind::Typedef,
    AstKind::UsingDeclaration,
    AstKind::Function,
    AstKind::Method,
    AstKind::LocalVariable,
    AstKind::FunctionParameter,
    AstKind::Field,
    AstKind::MacroDefinition,
    AstKind::MacroInstantiation,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerOp {
    RunOnSingleFile = 0x0,
    RunOnDirectory = 0x1,
    DropSingleFile = 0x2,
    DropAll = 0x3,
    FindAllReferences = 0x10,
}

impl IndexerOp {
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<i64> for IndexerOp {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, i64> {
        match value {
            0x0 => Ok(IndexerOp::RunOnSingleFile),
            0x1 => Ok(IndexerOp::RunOnDirectory),
            0x2 => Ok(IndexerOp::DropSingleFile),
            0x3 => Ok(IndexerOp::DropAll),
            0x10 => Ok(IndexerOp::FindAllReferences),
            other => Err(other),
        }
    }
}

/// Everything one indexing child needs, prepared at fan-out time and torn
/// down after the merge.
struct IndexerJob {
    input_list: PathBuf,
    worker_db: PathBuf,
    log_file: PathBuf,
}

pub struct SymbolIndexer {
    root_directory: PathBuf,
    symbol_db: Arc<Mutex<SymbolDatabase>>,
    symbol_db_path: PathBuf,
    parser: Arc<CxxParser>,
}

impl SymbolIndexer {
    pub fn new(parser: Arc<CxxParser>, root_directory: &Path) -> Self {
        Self {
            root_directory: root_directory.to_path_buf(),
            symbol_db: Arc::new(Mutex::new(SymbolDatabase::new())),
            symbol_db_path: root_directory.join(SYMBOL_DB_NAME),
            parser,
        }
    }

    /// The store shared with go-to-definition.
    pub fn symbol_db(&self) -> Arc<Mutex<SymbolDatabase>> {
        Arc::clone(&self.symbol_db)
    }

    pub fn symbol_db_path(&self) -> &Path {
        &self.symbol_db_path
    }

    fn lock_db(&self) -> MutexGuard<'_, SymbolDatabase> {
        self.symbol_db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Route one indexer request by numeric op id.
    pub fn handle(&self, args: &[Value]) -> (bool, Option<ResultData>) {
        let Some(op) = int_arg(args, 0) else {
            error!("Indexer request payload carries no operation id");
            return (false, None);
        };
        let args = &args[1..];
        match IndexerOp::try_from(op) {
            Ok(IndexerOp::RunOnSingleFile) => self.run_on_single_file(args),
            Ok(IndexerOp::RunOnDirectory) => self.run_on_directory(),
            Ok(IndexerOp::DropSingleFile) => self.drop_single_file(args),
            Ok(IndexerOp::DropAll) => self.drop_all(args),
            Ok(IndexerOp::FindAllReferences) => self.find_all_references(args),
            Err(unknown) => {
                error!("Unknown operation with ID={} triggered!", unknown);
                (false, None)
            }
        }
    }

    fn run_on_single_file(&self, args: &[Value]) -> (bool, Option<ResultData>) {
        let (Some(original), Some(contents)) = (str_arg(args, 0), str_arg(args, 1)) else {
            error!("run-on-single-file payload must be (original, contents)");
            return (false, None);
        };
        // Files modified but not saved are never indexed.
        if original != contents {
            return (true, None);
        }
        let original = Path::new(original);
        let mut db = self.lock_db();
        if let Err(e) = db.open(&self.symbol_db_path) {
            error!("Cannot open symbol database: {}", e);
            return (false, None);
        }
        let relative = project_relative(&self.root_directory, original);
        if let Err(e) = db.delete(&relative) {
            warn!("Cannot drop previous rows for '{}': {}", relative, e);
        }
        let success = index_single_file(
            &self.parser,
            &self.root_directory,
            original,
            original,
            &mut db,
        );
        (success, None)
    }

    fn run_on_directory(&self) -> (bool, Option<ResultData>) {
        let mut db = self.lock_db();
        let mut already_indexed = self.symbol_db_path.exists();

        // A store left behind by an older build is detected by its version
        // row and re-indexed from scratch.
        if already_indexed && !db.is_open() && !self.store_version_is_current() {
            warn!(
                "Symbol database '{}' has a stale or missing version row; re-indexing",
                self.symbol_db_path.display()
            );
            if let Err(e) = fs::remove_file(&self.symbol_db_path) {
                error!("Cannot remove stale symbol database: {}", e);
                return (false, None);
            }
            already_indexed = false;
        }

        // The connection is established either way.
        if let Err(e) = db.open(&self.symbol_db_path) {
            error!("Cannot open symbol database: {}", e);
            return (false, None);
        }

        if already_indexed {
            info!(
                "Directory '{}' already indexed ...",
                self.root_directory.display()
            );
            return (true, None);
        }

        info!(
            "Starting to index whole directory '{}' ...",
            self.root_directory.display()
        );
        let start = Instant::now();
        if let Err(e) = db.create_data_model() {
            error!("Cannot create symbol database schema: {}", e);
            return (false, None);
        }

        let source_files = source_files_in(&self.root_directory);
        info!("Found {} source files", source_files.len());

        let worker_count = num_cpus::get().max(1);
        let chunk_size = (source_files.len() / worker_count).max(1);
        let mut children: Vec<(Option<Child>, IndexerJob)> = Vec::new();
        if !source_files.is_empty() {
            for (ordinal, chunk) in slice_it(&source_files, chunk_size).into_iter().enumerate() {
                match self.prepare_job(&chunk, ordinal) {
                    Ok(job) => {
                        let child = self.start_indexing_subprocess(&job);
                        children.push((child, job));
                    }
                    Err(e) => error!("Cannot prepare indexing job: {}", e),
                }
            }
        }

        // Wait for every child, merge what succeeded; a crashed child only
        // costs its own chunk.
        let mut merged_stores = Vec::new();
        for (child, job) in &mut children {
            match child {
                Some(child) => match child.wait() {
                    Ok(status) if status.success() => merged_stores.push(job.worker_db.clone()),
                    Ok(status) => warn!(
                        "Indexing child exited with {}; chunk '{}' not merged",
                        status,
                        job.input_list.display()
                    ),
                    Err(e) => warn!("Cannot wait for indexing child: {}", e),
                },
                None => warn!(
                    "Indexing child for chunk '{}' never started",
                    job.input_list.display()
                ),
            }
        }
        if let Err(e) = db.insert_from(&merged_stores) {
            error!("Merging child stores failed: {}", e);
        }

        for (_, job) in &children {
            let _ = fs::remove_file(&job.input_list);
            let _ = fs::remove_file(&job.worker_db);
        }

        info!(
            "Indexing '{}' is completed, took {:.2}s",
            self.root_directory.display(),
            start.elapsed().as_secs_f64()
        );
        (true, None)
    }

    fn drop_single_file(&self, args: &[Value]) -> (bool, Option<ResultData>) {
        let Some(filename) = str_arg(args, 0) else {
            error!("drop-single-file payload carries no filename");
            return (false, None);
        };
        let mut db = self.lock_db();
        if let Err(e) = db.open(&self.symbol_db_path) {
            warn!("Cannot open symbol database: {}", e);
        }
        let relative = project_relative(&self.root_directory, Path::new(filename));
        // Dropping a file that was never indexed still succeeds.
        let dropped = db.delete(&relative);
        if let Err(e) = dropped.and(db.flush()) {
            debug!("Drop of '{}' had nothing to do: {}", relative, e);
        }
        (true, None)
    }

    fn drop_all(&self, args: &[Value]) -> (bool, Option<ResultData>) {
        let Some(delete_from_disk) = bool_arg(args, 0) else {
            error!("drop-all payload carries no removal flag");
            return (false, None);
        };
        let mut db = self.lock_db();
        if db.open(&self.symbol_db_path).is_ok() {
            let dropped = db.delete_all();
            if let Err(e) = dropped.and(db.flush()) {
                debug!("Drop-all had nothing to do: {}", e);
            }
        }
        if delete_from_disk {
            db.close();
            if let Err(e) = fs::remove_file(&self.symbol_db_path) {
                warn!(
                    "Cannot remove '{}': {}",
                    self.symbol_db_path.display(),
                    e
                );
            }
        }
        info!("Indexer DB dropped.");
        (true, None)
    }

    fn find_all_references(&self, args: &[Value]) -> (bool, Option<ResultData>) {
        let (Some(filename), Some(line), Some(column)) =
            (str_arg(args, 0), int_arg(args, 1), int_arg(args, 2))
        else {
            error!("find-all-references payload must be (filename, line, column)");
            return (false, None);
        };
        let start = Instant::now();
        let mut references = Vec::new();
        let filename = Path::new(filename);
        let Some(tunit) = self.parser.parse(filename, filename) else {
            return (false, Some(ResultData::References(references)));
        };
        if let Some(cursor) = self.parser.cursor_at(&tunit, line as u32, column as u32) {
            // Lookups run against the saved on-disk file; unsaved edits only
            // match whatever state was last indexed.
            if SUPPORTED_KINDS.contains(&cursor.kind) {
                let db = self.lock_db();
                match db.get_by_usr(cursor.lookup_usr()) {
                    Ok(rows) => {
                        for row in rows {
                            references.push(Reference {
                                filename: self.root_directory.join(&row.filename),
                                line: row.line,
                                column: row.column,
                                usr: row.usr,
                                context: row.context,
                            });
                        }
                    }
                    Err(e) => {
                        error!("Reference lookup failed: {}", e);
                        return (false, Some(ResultData::References(references)));
                    }
                }
            }
            info!(
                "Find-all-references of '{}' [{}, {}] took {:.3}s",
                cursor.name,
                line,
                column,
                start.elapsed().as_secs_f64()
            );
        }
        (true, Some(ResultData::References(references)))
    }

    fn store_version_is_current(&self) -> bool {
        match SymbolDatabase::with_file(&self.symbol_db_path) {
            Ok(db) => db.version_matches().unwrap_or(false),
            Err(_) => false,
        }
    }

    fn prepare_job(&self, chunk: &[Option<PathBuf>], ordinal: usize) -> std::io::Result<IndexerJob> {
        let input = tempfile::Builder::new()
            .prefix(".cxxd_idx_input")
            .tempfile_in(&self.root_directory)?;
        let (mut input_file, input_list) = input.keep().map_err(|e| e.error)?;
        for path in chunk.iter().flatten() {
            writeln!(input_file, "{}", path.display())?;
        }
        drop(input_file);

        let worker = tempfile::Builder::new()
            .prefix(SYMBOL_DB_NAME)
            .tempfile_in(&self.root_directory)?;
        let (_, worker_db) = worker.keep().map_err(|e| e.error)?;

        Ok(IndexerJob {
            input_list,
            worker_db,
            log_file: self.child_log_file(ordinal),
        })
    }

    fn child_log_file(&self, ordinal: usize) -> PathBuf {
        let base = logging::log_file()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root_directory.join(".cxxd_index.log"));
        PathBuf::from(format!("{}_{}", base.display(), ordinal + 1))
    }

    fn start_indexing_subprocess(&self, job: &IndexerJob) -> Option<Child> {
        let binary = chunk_worker_binary();
        let spawned = Command::new(&binary)
            .arg("--project-root")
            .arg(&self.root_directory)
            .arg("--compiler-flags")
            .arg(self.parser.flags().path())
            .arg("--input-list")
            .arg(&job.input_list)
            .arg("--output-db")
            .arg(&job.worker_db)
            .arg("--log-file")
            .arg(&job.log_file)
            .spawn();
        match spawned {
            Ok(child) => Some(child),
            Err(e) => {
                error!("Cannot spawn '{}': {}", binary.display(), e);
                None
            }
        }
    }
}

/// Index every file named in `input_list` into `output_db`. The entry point
/// the child binary runs; parses with a cache-disabled facade since every
/// file is touched exactly once.
pub fn index_file_list(
    root_directory: &Path,
    input_list: &Path,
    compiler_flags: &Path,
    output_db: &Path,
) -> anyhow::Result<()> {
    let flags = CompilerFlags::from_file(compiler_flags)?;
    let parser = CxxParser::new(flags, TunitCache::new(CachePolicy::Disabled));
    let mut db = SymbolDatabase::with_file(output_db)?;
    db.create_data_model()?;
    let listing = fs::read_to_string(input_list)?;
    for line in listing.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let path = Path::new(line);
        index_single_file(&parser, root_directory, path, path, &mut db);
    }
    db.flush()?;
    Ok(())
}

/// Parse one file and record every supported occurrence. Returns success iff
/// the parse produced a translation unit.
pub fn index_single_file(
    parser: &CxxParser,
    root_directory: &Path,
    contents_filename: &Path,
    original_filename: &Path,
    symbol_db: &mut SymbolDatabase,
) -> bool {
    info!("Indexing a file '{}' ...", original_filename.display());
    let start = Instant::now();
    let Some(tunit) = parser.parse(contents_filename, original_filename) else {
        warn!("Cannot parse '{}'", original_filename.display());
        return false;
    };
    let relative = project_relative(root_directory, tunit.spelling());
    parser.traverse(&tunit, |cursor| {
        // Symbols that arrived through an include are pruned with their
        // whole subtree.
        if cursor.location.filename != tunit.spelling() {
            return VisitResult::Continue;
        }
        if SUPPORTED_KINDS.contains(&cursor.kind) {
            let record = SymbolRecord {
                filename: relative.clone(),
                line: cursor.location.line,
                column: cursor.location.column,
                usr: cursor.lookup_usr().to_string(),
                context: tunit.line_text(cursor.location.line).to_string(),
                kind: cursor.kind.tag(),
                is_definition: cursor.is_definition,
            };
            if let Err(e) = symbol_db.insert_single(&record) {
                warn!("Cannot record occurrence of '{}': {}", cursor.name, e);
            }
        }
        VisitResult::Recurse
    });
    if let Err(e) = symbol_db.flush() {
        warn!("Cannot flush symbol database: {}", e);
        return false;
    }
    info!(
        "Indexing '{}' took {:.3}s",
        original_filename.display(),
        start.elapsed().as_secs_f64()
    );
    true
}

/// Recursive walk collecting C/C++ sources. Order is not guaranteed.
pub fn source_files_in(root_directory: &Path) -> Vec<PathBuf> {
    WalkDir::new(root_directory)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
        })
        .map(|entry| entry.into_path())
        .collect()
}

/// Equal-length chunks of `chunk_size`; the last one is padded with sentinel
/// entries the consumer skips.
pub fn slice_it(files: &[PathBuf], chunk_size: usize) -> Vec<Vec<Option<PathBuf>>> {
    let mut chunks = Vec::new();
    for chunk in files.chunks(chunk_size.max(1)) {
        let mut padded: Vec<Option<PathBuf>> = chunk.iter().cloned().map(Some).collect();
        while padded.len() < chunk_size {
            padded.push(None);
        }
        chunks.push(padded);
    }
    chunks
}

/// Strip the project-root prefix (and its separator) from `path`; paths from
/// outside the project fall back to their final component.
pub fn project_relative(root_directory: &Path, path: &Path) -> String {
    match path.strip_prefix(root_directory) {
        Ok(relative) => relative.to_string_lossy().into_owned(),
        Err(_) => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

fn chunk_worker_binary() -> PathBuf {
    if let Ok(path) = env::var(CHUNK_WORKER_ENV) {
        return PathBuf::from(path);
    }
    let name = format!("cxxd-index-chunk{}", env::consts::EXE_SUFFIX);
    if let Ok(exe) = env::current_exe() {
        // next to the daemon binary; one level up covers test binaries,
        // which live in the deps/ subdirectory
        let candidates = [exe.parent(), exe.parent().and_then(Path::parent)];
        for dir in candidates.into_iter().flatten() {
            let candidate = dir.join(&name);
            if candidate.is_file() {
                return candidate;
            }
        }
    }
    PathBuf::from(name)
}
