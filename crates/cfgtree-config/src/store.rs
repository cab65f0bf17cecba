use cfgtree_core::{ConfigError, Result, Value};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use semver::Version;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

use crate::ini::{self, IniBlock, IniDocument};
use crate::option::OptionSpec;
use crate::section::{EntrySpec, SECTION_SEPARATOR, Section, SectionSpec, VERSION_KEY};

/// Whether a mutation rewrites the backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persist {
    /// The operation's own default: options and resets persist, sections
    /// persist only when created with initial entries.
    #[default]
    Auto,
    Yes,
    No,
}

impl Persist {
    fn resolve(self, default: bool) -> bool {
        match self {
            Persist::Auto => default,
            Persist::Yes => true,
            Persist::No => false,
        }
    }
}

/// How the file contents were taken into account when the store was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The file was empty or had just been created.
    Fresh,
    /// The file was parsed and replayed onto the tree.
    Loaded,
    /// The file declared an incompatible version and was moved aside.
    Recovered { backup: PathBuf },
    /// The file could not be read or parsed; only seeded entries are present.
    Defaulted { reason: String },
}

/// The open configuration file. Reads rewind to the start, writes replace
/// the whole content.
struct BackingFile {
    path: PathBuf,
    file: File,
}

impl BackingFile {
    fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn read_all(&mut self) -> Result<String> {
        let mut text = String::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_string(&mut text)?;
        Ok(text)
    }

    fn rewrite(&mut self, text: &str) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(text.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    /// Move the file to `<path>.old` and start over with an empty one.
    fn archive(self) -> Result<(Self, PathBuf)> {
        let BackingFile { path, file } = self;
        drop(file);
        let backup = backup_path(&path);
        fs::rename(&path, &backup)?;
        Ok((BackingFile::open(&path)?, backup))
    }
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".old");
    PathBuf::from(name)
}

/// Builder for a [`Store`]: backing file, schema version and seed entries.
pub struct StoreBuilder {
    path: PathBuf,
    version: Option<Version>,
    seed: Vec<(String, EntrySpec)>,
}

impl StoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            version: None,
            seed: Vec::new(),
        }
    }

    /// Schema version written to and expected from the file. Defaults to
    /// the crate version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Add a default entry, present before the file is loaded.
    pub fn seed(mut self, name: &str, spec: impl Into<EntrySpec>) -> Self {
        self.seed.push((name.to_string(), spec.into()));
        self
    }

    pub fn seed_all<I, K>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, EntrySpec)>,
        K: Into<String>,
    {
        self.seed
            .extend(entries.into_iter().map(|(name, spec)| (name.into(), spec)));
        self
    }

    /// Open (creating if absent) the backing file, seed the tree and load the
    /// file into it.
    ///
    /// File contents never make this fail: a version mismatch moves the file
    /// to `<path>.old`, other load errors are logged and the seeded defaults
    /// are kept. Errors come only from an unopenable file or invalid seeds.
    pub fn open(self) -> Result<Store> {
        let version = match self.version {
            Some(version) => version,
            None => Version::parse(env!("CARGO_PKG_VERSION"))?,
        };
        let path = self.path;
        info!(?path, %version, "opening configuration store");

        let mut file = BackingFile::open(&path)?;
        let mut root = Section::root();
        root.update(self.seed)?;

        let outcome = match load_into(&mut root, &mut file, &version) {
            Ok(outcome) => outcome,
            Err(ConfigError::VersionMismatch { found, expected }) => {
                warn!(?path, ?found, %expected, "configuration version mismatch, archiving file");
                let (fresh, backup) = file.archive()?;
                file = fresh;
                LoadOutcome::Recovered { backup }
            }
            Err(e) => {
                error!(?path, error = %e, "failed to load configuration");
                warn!(?path, "unable to parse configuration, using defaults");
                LoadOutcome::Defaulted {
                    reason: e.to_string(),
                }
            }
        };
        debug!(?outcome, entries = root.len(), "configuration store ready");

        Ok(Store {
            root: RwLock::new(root),
            file: Mutex::new(file),
            version,
            path,
            outcome,
            writes: AtomicU64::new(0),
        })
    }
}

/// Parse the file and replay it onto `root`. Nothing is applied unless the
/// whole file parses and its version is compatible.
fn load_into(root: &mut Section, file: &mut BackingFile, version: &Version) -> Result<LoadOutcome> {
    let text = file.read_all()?;
    if text.trim().is_empty() {
        return Ok(LoadOutcome::Fresh);
    }
    let doc = ini::parse(&text)?;
    check_version(doc.global_value(VERSION_KEY), version)?;

    let globals = doc
        .global
        .iter()
        .filter(|(key, _)| !key.eq_ignore_ascii_case(VERSION_KEY));
    apply_options(root, globals);

    for block in &doc.blocks {
        match root.make_sections(&block.header) {
            Ok(section) => apply_options(section, block.entries.iter()),
            Err(e) => {
                warn!(section = %block.header, line = block.line, error = %e, "skipping stored section");
            }
        }
    }
    Ok(LoadOutcome::Loaded)
}

/// Only (major, minor) must match; the patch level is ignored.
fn check_version(found: Option<&str>, expected: &Version) -> Result<()> {
    let mismatch = || ConfigError::VersionMismatch {
        found: found.map(str::to_string),
        expected: expected.to_string(),
    };
    let found_version = found
        .and_then(|v| Version::parse(v.trim()).ok())
        .ok_or_else(mismatch)?;
    if (found_version.major, found_version.minor) != (expected.major, expected.minor) {
        return Err(mismatch());
    }
    Ok(())
}

/// Set each stored value, creating string options for unknown keys. Values
/// that fail validation keep the default.
fn apply_options<'a>(section: &mut Section, entries: impl Iterator<Item = &'a (String, String)>) {
    for (key, raw) in entries {
        let result = match section.set(key, raw.as_str()) {
            Err(e) if e.is_not_found() => section
                .add_option(key, OptionSpec::new(raw.as_str()))
                .map(|_| true),
            other => other,
        };
        if let Err(e) = result {
            warn!(key = %key, error = %e, "ignoring stored value");
        }
    }
}

/// A configuration tree bound to its backing file.
///
/// Every persisting mutation re-serializes the whole tree and rewrites the
/// file before returning. The tree lock is held across mutation and write,
/// and the file lock across serialization and write, so concurrent callers
/// never interleave their read-modify-write cycles.
pub struct Store {
    root: RwLock<Section>,
    file: Mutex<BackingFile>,
    version: Version,
    path: PathBuf,
    outcome: LoadOutcome,
    writes: AtomicU64,
}

impl Store {
    /// Resolve the store path: explicit path > CFGTREE_CONFIG env > ~/.config/cfgtree/cfgtree.ini
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("CFGTREE_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cfgtree")
            .join("cfgtree.ini")
    }

    pub fn builder(path: impl Into<PathBuf>) -> StoreBuilder {
        StoreBuilder::new(path)
    }

    pub fn open(path: impl Into<PathBuf>, version: Version) -> Result<Self> {
        StoreBuilder::new(path).version(version).open()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.outcome
    }

    /// Number of times the backing file has been rewritten.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Read access to the whole tree.
    pub fn root(&self) -> RwLockReadGuard<'_, Section> {
        self.root.read()
    }

    pub fn read<T>(&self, f: impl FnOnce(&Section) -> T) -> T {
        f(&self.root.read())
    }

    /// Current value of `key` in the section at `path` (`""` is the root).
    pub fn get(&self, path: &str, key: &str) -> Result<Value> {
        Ok(self.root.read().section_at(path)?.get(key)?.clone())
    }

    pub fn get_default(&self, path: &str, key: &str) -> Result<Value> {
        Ok(self.root.read().section_at(path)?.get_default(key)?.clone())
    }

    pub fn set(&self, path: &str, key: &str, raw: impl Into<Value>) -> Result<()> {
        self.set_with(path, key, raw, Persist::Auto)
    }

    /// Setting an option to its current value never rewrites the file.
    pub fn set_with(&self, path: &str, key: &str, raw: impl Into<Value>, persist: Persist) -> Result<()> {
        self.mutate(persist, true, |root| root.section_at_mut(path)?.set(key, raw))
    }

    pub fn add_option(&self, path: &str, name: &str, spec: OptionSpec) -> Result<()> {
        self.add_option_with(path, name, spec, Persist::Auto)
    }

    pub fn add_option_with(&self, path: &str, name: &str, spec: OptionSpec, persist: Persist) -> Result<()> {
        self.mutate(persist, true, |root| {
            root.section_at_mut(path)?.add_option(name, spec)?;
            Ok(true)
        })
    }

    pub fn add_section(&self, path: &str, name: &str, spec: SectionSpec) -> Result<()> {
        self.add_section_with(path, name, spec, Persist::Auto)
    }

    /// With [`Persist::Auto`] the file is rewritten only when `spec` carries
    /// initial entries.
    pub fn add_section_with(&self, path: &str, name: &str, spec: SectionSpec, persist: Persist) -> Result<()> {
        let seeded = !spec.is_empty();
        self.mutate(persist, seeded, |root| {
            root.section_at_mut(path)?.add_section(name, spec)?;
            Ok(true)
        })
    }

    pub fn update<I, K>(&self, path: &str, entries: I, persist: Persist) -> Result<()>
    where
        I: IntoIterator<Item = (K, EntrySpec)>,
        K: Into<String>,
    {
        let entries: Vec<(K, EntrySpec)> = entries.into_iter().collect();
        let changed = !entries.is_empty();
        self.mutate(persist, true, |root| {
            root.section_at_mut(path)?.update(entries)?;
            Ok(changed)
        })
    }

    /// Reset every option under `path` to its default.
    pub fn reset(&self, path: &str, persist: Persist) -> Result<()> {
        self.mutate(persist, true, |root| Ok(root.section_at_mut(path)?.reset()))
    }

    /// Apply several mutations to the tree and rewrite the file once at the
    /// end. Nothing is written if `f` fails; mutations made before the
    /// failure stay in memory.
    pub fn transaction<T>(&self, f: impl FnOnce(&mut Section) -> Result<T>) -> Result<T> {
        let mut root = self.root.write();
        let out = f(&mut root)?;
        self.write_tree(&root)?;
        Ok(out)
    }

    /// Rewrite the backing file from the current tree.
    pub fn save(&self) -> Result<()> {
        let root = self.root.read();
        self.write_tree(&root)
    }

    /// Final save, then release the file.
    pub fn close(self) -> Result<()> {
        self.save()?;
        info!(path = ?self.path, "configuration store closed");
        Ok(())
    }

    /// The file text [`save`](Self::save) would write.
    pub fn render(&self) -> String {
        ini::write(&self.to_document(&self.root.read()))
    }

    fn mutate<F>(&self, persist: Persist, default: bool, f: F) -> Result<()>
    where
        F: FnOnce(&mut Section) -> Result<bool>,
    {
        let mut root = self.root.write();
        let changed = f(&mut root)?;
        if changed && persist.resolve(default) {
            self.write_tree(&root)?;
        }
        Ok(())
    }

    fn write_tree(&self, root: &Section) -> Result<()> {
        let mut file = self.file.lock();
        let text = ini::write(&self.to_document(root));
        file.rewrite(&text)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!(path = ?file.path, bytes = text.len(), "configuration written");
        Ok(())
    }

    fn to_document(&self, root: &Section) -> IniDocument {
        let mut doc = IniDocument::default();
        doc.global.push((VERSION_KEY.to_string(), self.version.to_string()));
        doc.global
            .extend(root.options().map(|(name, option)| (name.to_string(), option.file_value())));
        for (name, section) in root.sections() {
            flatten(&mut doc.blocks, name.to_string(), section);
        }
        doc
    }
}

fn flatten(blocks: &mut Vec<IniBlock>, path: String, section: &Section) {
    blocks.push(IniBlock {
        header: path.clone(),
        line: 0,
        entries: section
            .options()
            .map(|(name, option)| (name.to_string(), option.file_value()))
            .collect(),
    });
    for (name, child) in section.sections() {
        flatten(blocks, format!("{path}{SECTION_SEPARATOR}{name}"), child);
    }
}
