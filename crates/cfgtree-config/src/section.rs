//! Sections: ordered, case-insensitive namespaces of options and sub-sections.

use cfgtree_core::{ConfigError, Result, Value};
use std::collections::HashMap;

use crate::option::{ConfigOption, OptionSpec};

/// Separator between section names in a section path (`network:proxy`).
pub const SECTION_SEPARATOR: char = ':';

/// Option name reserved at the root for the schema version.
pub const VERSION_KEY: &str = "version";

/// Section names the root refuses: they alias the global block in the file.
const RESERVED_ROOT_SECTIONS: [&str; 2] = ["default", ""];

/// A node of the configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Option(ConfigOption),
    Section(Section),
}

impl Entry {
    pub fn is_section(&self) -> bool {
        matches!(self, Entry::Section(_))
    }

    pub fn is_option(&self) -> bool {
        matches!(self, Entry::Option(_))
    }

    /// Reset this entry and everything below it. Returns whether anything changed.
    pub fn reset(&mut self) -> bool {
        match self {
            Entry::Option(option) => option.reset(),
            Entry::Section(section) => section.reset(),
        }
    }
}

impl From<ConfigOption> for Entry {
    fn from(option: ConfigOption) -> Self {
        Entry::Option(option)
    }
}

impl From<Section> for Entry {
    fn from(section: Section) -> Self {
        Entry::Section(section)
    }
}

/// Insertion-ordered map whose keys compare case-insensitively.
///
/// The original spelling of each name is kept for display and serialization;
/// lookups go through the lower-cased form.
#[derive(Debug, Clone, Default, PartialEq)]
struct EntryMap {
    entries: Vec<(String, Entry)>,
    index: HashMap<String, usize>,
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

impl EntryMap {
    fn position(&self, name: &str) -> Option<usize> {
        self.index.get(&fold(name)).copied()
    }

    fn get(&self, name: &str) -> Option<&Entry> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Entry> {
        match self.position(name) {
            Some(i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    /// Insert a new key; the caller has checked that it is absent.
    fn push(&mut self, name: String, entry: Entry) -> &mut Entry {
        let i = self.entries.len();
        self.index.insert(fold(&name), i);
        self.entries.push((name, entry));
        &mut self.entries[i].1
    }

    /// Insert or replace in place, keeping the original position.
    fn upsert(&mut self, name: String, entry: Entry) {
        match self.position(&name) {
            Some(i) => self.entries[i] = (name, entry),
            None => {
                self.push(name, entry);
            }
        }
    }
}

/// A namespace node owning named options and nested sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Section {
    entries: EntryMap,
    root: bool,
    pub label: String,
    pub desc: String,
}

impl Section {
    pub fn new(label: Option<String>, desc: Option<String>) -> Self {
        Self {
            label: label.unwrap_or_default(),
            desc: desc.unwrap_or_default(),
            ..Self::default()
        }
    }

    /// The top of a store's tree. It refuses names that would collide with the
    /// file's global block.
    pub fn root() -> Self {
        Self {
            root: true,
            ..Self::default()
        }
    }

    pub fn from_spec(spec: SectionSpec) -> Result<Self> {
        let mut section = Section::new(spec.label, spec.desc);
        section.update(spec.entries)?;
        Ok(section)
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn len(&self) -> usize {
        self.entries.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.position(name).is_some()
    }

    /// Entries in insertion order, with their original spelling.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn options(&self) -> impl Iterator<Item = (&str, &ConfigOption)> {
        self.iter().filter_map(|(name, entry)| match entry {
            Entry::Option(option) => Some((name, option)),
            Entry::Section(_) => None,
        })
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.iter().filter_map(|(name, entry)| match entry {
            Entry::Section(section) => Some((name, section)),
            Entry::Option(_) => None,
        })
    }

    pub fn entry(&self, name: &str) -> Result<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| ConfigError::NotFound(name.to_string()))
    }

    pub fn entry_mut(&mut self, name: &str) -> Result<&mut Entry> {
        self.entries
            .get_mut(name)
            .ok_or_else(|| ConfigError::NotFound(name.to_string()))
    }

    pub fn is_section(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(Entry::is_section)
    }

    pub fn is_option(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(Entry::is_option)
    }

    pub fn get_option(&self, name: &str) -> Result<&ConfigOption> {
        match self.entry(name)? {
            Entry::Option(option) => Ok(option),
            Entry::Section(_) => Err(wrong_variant(name, "a section", "an option")),
        }
    }

    pub fn get_option_mut(&mut self, name: &str) -> Result<&mut ConfigOption> {
        match self.entry_mut(name)? {
            Entry::Option(option) => Ok(option),
            Entry::Section(_) => Err(wrong_variant(name, "a section", "an option")),
        }
    }

    pub fn get_section(&self, name: &str) -> Result<&Section> {
        match self.entry(name)? {
            Entry::Section(section) => Ok(section),
            Entry::Option(_) => Err(wrong_variant(name, "an option", "a section")),
        }
    }

    pub fn get_section_mut(&mut self, name: &str) -> Result<&mut Section> {
        match self.entry_mut(name)? {
            Entry::Section(section) => Ok(section),
            Entry::Option(_) => Err(wrong_variant(name, "an option", "a section")),
        }
    }

    /// Current value of the named option.
    pub fn get(&self, name: &str) -> Result<&Value> {
        Ok(self.get_option(name)?.get())
    }

    pub fn get_default(&self, name: &str) -> Result<&Value> {
        Ok(self.get_option(name)?.get_default())
    }

    /// Set the named option; see [`ConfigOption::set`] for the return value.
    pub fn set(&mut self, name: &str, raw: impl Into<Value>) -> Result<bool> {
        self.get_option_mut(name)?.set(raw)
    }

    pub fn add_option(&mut self, name: &str, spec: OptionSpec) -> Result<&mut ConfigOption> {
        self.check_new_name(name, false)?;
        let mut option = spec.build()?;
        if option.label.is_empty() {
            option.label = default_label(name);
        }
        match self.entries.push(name.to_string(), Entry::Option(option)) {
            Entry::Option(option) => Ok(option),
            Entry::Section(_) => unreachable!("just inserted an option"),
        }
    }

    pub fn add_section(&mut self, name: &str, spec: SectionSpec) -> Result<&mut Section> {
        self.check_new_name(name, true)?;
        let mut section = Section::from_spec(spec)?;
        if section.label.is_empty() {
            section.label = default_label(name);
        }
        match self.entries.push(name.to_string(), Entry::Section(section)) {
            Entry::Section(section) => Ok(section),
            Entry::Option(_) => unreachable!("just inserted a section"),
        }
    }

    /// Reset every descendant option. Returns whether any value changed.
    pub fn reset(&mut self) -> bool {
        self.entries
            .entries
            .iter_mut()
            .fold(false, |changed, (_, entry)| entry.reset() || changed)
    }

    /// Bulk insert. Ready-made entries are adopted as-is, specs are built.
    /// A name that already exists (in any case) is replaced in place. Nothing
    /// is inserted unless every entry builds.
    pub fn update<I, K>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, EntrySpec)>,
        K: Into<String>,
    {
        let mut built = Vec::new();
        for (name, spec) in entries {
            let name = name.into();
            let entry = spec.into_entry()?;
            self.check_name(&name, entry.is_section())?;
            built.push((name, entry));
        }
        for (name, mut entry) in built {
            match &mut entry {
                Entry::Option(option) if option.label.is_empty() => option.label = default_label(&name),
                Entry::Section(section) => {
                    // An adopted copy of a store root is an ordinary child here.
                    section.root = false;
                    if section.label.is_empty() {
                        section.label = default_label(&name);
                    }
                }
                _ => {}
            }
            self.entries.upsert(name, entry);
        }
        Ok(())
    }

    /// Resolve a `:`-joined path of nested sections. The empty path is `self`.
    pub fn section_at(&self, path: &str) -> Result<&Section> {
        let mut section = self;
        for name in split_path(path) {
            section = section.get_section(name)?;
        }
        Ok(section)
    }

    pub fn section_at_mut(&mut self, path: &str) -> Result<&mut Section> {
        let mut section = self;
        for name in split_path(path) {
            section = section.get_section_mut(name)?;
        }
        Ok(section)
    }

    /// Like [`section_at_mut`](Self::section_at_mut), creating every missing
    /// section along the way.
    pub fn make_sections(&mut self, path: &str) -> Result<&mut Section> {
        let mut section = self;
        for name in split_path(path) {
            section = if section.contains(name) {
                section.get_section_mut(name)?
            } else {
                section.add_section(name, SectionSpec::new())?
            };
        }
        Ok(section)
    }

    fn check_new_name(&self, name: &str, is_section: bool) -> Result<()> {
        self.check_name(name, is_section)?;
        if self.contains(name) {
            return Err(ConfigError::AlreadyExistsKey(name.to_string()));
        }
        Ok(())
    }

    fn check_name(&self, name: &str, is_section: bool) -> Result<()> {
        if self.root {
            let folded = fold(name);
            if is_section && RESERVED_ROOT_SECTIONS.contains(&folded.as_str()) {
                return Err(ConfigError::InvalidValue(format!("`{name}` is a reserved section name")));
            }
            if !is_section && folded == VERSION_KEY {
                return Err(ConfigError::InvalidValue(format!("`{name}` is a reserved option name")));
            }
        }
        if name.contains(SECTION_SEPARATOR) {
            return Err(ConfigError::InvalidValue(format!(
                "`{name}` contains the section separator `{SECTION_SEPARATOR}`"
            )));
        }
        let malformed = name.is_empty()
            || name.trim() != name
            || name.contains(['=', '\n', '\r', '[', ']'])
            || name.starts_with(['#', ';']);
        if malformed {
            return Err(ConfigError::InvalidValue(format!("`{name}` is not a valid name")));
        }
        Ok(())
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split(SECTION_SEPARATOR).filter(|_| !path.is_empty())
}

fn wrong_variant(name: &str, found: &str, wanted: &str) -> ConfigError {
    ConfigError::InvalidValue(format!("`{name}` is {found}, not {wanted}"))
}

/// `" proxy_host"` becomes `"Proxy_host"`.
fn default_label(name: &str) -> String {
    let mut chars = name.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Typed description of an entry for [`Section::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum EntrySpec {
    Option(OptionSpec),
    Section(SectionSpec),
    /// An already-built entry, adopted unchanged.
    Entry(Entry),
}

impl EntrySpec {
    fn into_entry(self) -> Result<Entry> {
        match self {
            EntrySpec::Option(spec) => spec.build().map(Entry::Option),
            EntrySpec::Section(spec) => Section::from_spec(spec).map(Entry::Section),
            EntrySpec::Entry(entry) => Ok(entry),
        }
    }
}

impl From<OptionSpec> for EntrySpec {
    fn from(spec: OptionSpec) -> Self {
        EntrySpec::Option(spec)
    }
}

impl From<SectionSpec> for EntrySpec {
    fn from(spec: SectionSpec) -> Self {
        EntrySpec::Section(spec)
    }
}

impl From<Entry> for EntrySpec {
    fn from(entry: Entry) -> Self {
        EntrySpec::Entry(entry)
    }
}

impl From<ConfigOption> for EntrySpec {
    fn from(option: ConfigOption) -> Self {
        EntrySpec::Entry(Entry::Option(option))
    }
}

impl From<Section> for EntrySpec {
    fn from(section: Section) -> Self {
        EntrySpec::Entry(Entry::Section(section))
    }
}

/// Typed description of a section and its initial entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionSpec {
    pub label: Option<String>,
    pub desc: Option<String>,
    pub entries: Vec<(String, EntrySpec)>,
}

impl SectionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn desc(mut self, desc: &str) -> Self {
        self.desc = Some(desc.to_string());
        self
    }

    pub fn option(self, name: &str, spec: OptionSpec) -> Self {
        self.entry(name, spec)
    }

    pub fn section(self, name: &str, spec: SectionSpec) -> Self {
        self.entry(name, spec)
    }

    pub fn entry(mut self, name: &str, spec: impl Into<EntrySpec>) -> Self {
        self.entries.push((name.to_string(), spec.into()));
        self
    }

    /// Whether the section starts out with no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgtree_core::InputKind;

    fn general() -> Section {
        let mut section = Section::new(None, None);
        section.add_option("language", OptionSpec::new("en")).unwrap();
        section
            .add_option("debug_mode", OptionSpec::new(false).kind(InputKind::Bool))
            .unwrap();
        section
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut section = general();
        section.add_section("proxy", SectionSpec::new()).unwrap();
        section.add_option("folder", OptionSpec::new("/tmp")).unwrap();
        let names: Vec<_> = section.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["language", "debug_mode", "proxy", "folder"]);
    }

    #[test]
    fn test_case_insensitive_lookup_and_duplicates() {
        let mut section = general();
        assert_eq!(section.get("LANGUAGE").unwrap(), &Value::from("en"));
        let err = section.add_option("Language", OptionSpec::new("de")).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExistsKey(_)));
        let err = section.add_section("DEBUG_MODE", SectionSpec::new()).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExistsKey(_)));
    }

    #[test]
    fn test_separator_in_section_name() {
        let mut section = general();
        let err = section.add_section("network:proxy", SectionSpec::new()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_wrong_variant_and_missing() {
        let mut section = general();
        section.add_section("log", SectionSpec::new()).unwrap();
        assert!(matches!(section.get_section("language"), Err(ConfigError::InvalidValue(_))));
        assert!(matches!(section.get_option("log"), Err(ConfigError::InvalidValue(_))));
        assert!(matches!(section.get_option("nope"), Err(ConfigError::NotFound(_))));
        assert!(section.is_section("LOG"));
        assert!(section.is_option("language"));
        assert!(!section.is_option("nope"));
    }

    #[test]
    fn test_default_labels() {
        let mut section = general();
        assert_eq!(section.get_option("debug_mode").unwrap().label, "Debug_mode");
        let log = section
            .add_section("log", SectionSpec::new().label("Logging"))
            .unwrap();
        assert_eq!(log.label, "Logging");
    }

    #[test]
    fn test_reset_is_recursive() {
        let mut section = general();
        let nested = section.add_section("log", SectionSpec::new()).unwrap();
        nested
            .add_option("console", OptionSpec::new(true).kind(InputKind::Bool))
            .unwrap();
        nested.set("console", false).unwrap();
        section.set("language", "de").unwrap();

        assert!(section.reset());
        assert_eq!(section.get("language").unwrap(), &Value::from("en"));
        assert_eq!(section.section_at("log").unwrap().get("console").unwrap(), &Value::Bool(true));
        assert!(!section.reset());
    }

    #[test]
    fn test_update_builds_and_adopts() {
        let prebuilt = OptionSpec::new("9666").kind(InputKind::Int).build().unwrap();
        let mut section = Section::new(None, None);
        section
            .update([
                ("port".to_string(), EntrySpec::from(prebuilt.clone())),
                (
                    "webui".to_string(),
                    SectionSpec::new()
                        .option("prefix", OptionSpec::new(""))
                        .into(),
                ),
            ])
            .unwrap();
        assert_eq!(section.get_option("port").unwrap().get(), prebuilt.get());
        assert!(section.section_at("webui").unwrap().is_option("prefix"));
    }

    #[test]
    fn test_update_replaces_in_place() {
        let mut section = general();
        section
            .update([("LANGUAGE", EntrySpec::from(OptionSpec::new("fr")))])
            .unwrap();
        let names: Vec<_> = section.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["LANGUAGE", "debug_mode"]);
        assert_eq!(section.get("language").unwrap(), &Value::from("fr"));
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let mut section = Section::new(None, None);
        let result = section.update([
            ("good", EntrySpec::from(OptionSpec::new("1"))),
            ("bad", EntrySpec::from(OptionSpec::new("x").kind(InputKind::Int))),
        ]);
        assert!(result.is_err());
        assert!(section.is_empty());
    }

    #[test]
    fn test_make_sections_creates_missing() {
        let mut root = Section::root();
        root.make_sections("network:proxy:auth").unwrap();
        assert!(root.section_at("NETWORK:Proxy").unwrap().is_section("auth"));
        root.make_sections("network:proxy").unwrap();
        assert_eq!(root.get_section("network").unwrap().len(), 1);
    }

    #[test]
    fn test_root_reserved_names() {
        let mut root = Section::root();
        assert!(matches!(
            root.add_section("DEFAULT", SectionSpec::new()),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            root.add_option("Version", OptionSpec::new("1")),
            Err(ConfigError::InvalidValue(_))
        ));
        let nested = root.add_section("general", SectionSpec::new()).unwrap();
        assert!(nested.add_option("version", OptionSpec::new("1")).is_ok());
    }

    #[test]
    fn test_adopted_root_copy_is_not_reserved() {
        let mut root = Section::root();
        let copy = Section::root();
        root.update([("backup", EntrySpec::Entry(Entry::Section(copy)))])
            .unwrap();
        let adopted = root.get_section_mut("backup").unwrap();
        assert!(!adopted.is_root());
        assert!(adopted.add_option("version", OptionSpec::new("1")).is_ok());
        assert!(adopted.add_section("default", SectionSpec::new()).is_ok());
    }

    #[test]
    fn test_malformed_names() {
        let mut section = Section::new(None, None);
        for name in ["", " padded", "a=b", "[x]", "#comment"] {
            assert!(
                matches!(section.add_option(name, OptionSpec::new("")), Err(ConfigError::InvalidValue(_))),
                "{name:?}"
            );
        }
    }
}
