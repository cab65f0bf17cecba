use cfgtree_core::{ConfigError, InputKind, Result, Value};
use std::fmt;

/// A single typed leaf value with a default and an optional allow-list.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOption {
    kind: InputKind,
    value: Value,
    default: Value,
    allowed: Vec<Value>,
    pub label: String,
    pub desc: String,
}

impl ConfigOption {
    /// Build an option; `raw` becomes both the current and the default value.
    pub fn new(
        kind: InputKind,
        raw: impl Into<Value>,
        label: Option<String>,
        desc: Option<String>,
        allowed: Vec<Value>,
    ) -> Result<Self> {
        let value = kind.normalize(raw.into())?;
        let allowed = allowed
            .into_iter()
            .map(|v| kind.normalize(v))
            .collect::<Result<Vec<_>>>()?;
        if !allowed.is_empty() && !allowed.contains(&value) {
            return Err(ConfigError::InvalidValue(format!(
                "default `{}` is not one of the allowed values",
                kind.render(&value)
            )));
        }
        Ok(Self {
            kind,
            default: value.clone(),
            value,
            allowed,
            label: label.unwrap_or_default(),
            desc: desc.unwrap_or_default(),
        })
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    pub fn get(&self) -> &Value {
        &self.value
    }

    pub fn get_default(&self) -> &Value {
        &self.default
    }

    pub fn allowed(&self) -> &[Value] {
        &self.allowed
    }

    /// Normalize and store `raw`.
    ///
    /// Returns `Ok(false)` without touching anything when the normalized value
    /// equals the current one; callers use that to skip rewriting the file.
    pub fn set(&mut self, raw: impl Into<Value>) -> Result<bool> {
        let value = self.kind.normalize(raw.into())?;
        if !self.allowed.is_empty() && !self.allowed.contains(&value) {
            return Err(ConfigError::InvalidValue(format!(
                "`{}` is not one of: {}",
                self.kind.render(&value),
                self.allowed_display()
            )));
        }
        if self.value == value {
            return Ok(false);
        }
        self.value = value;
        Ok(true)
    }

    /// Restore the default. The default passed validation at creation time.
    pub fn reset(&mut self) -> bool {
        if self.value == self.default {
            return false;
        }
        self.value = self.default.clone();
        true
    }

    /// Text written to the configuration file.
    pub fn file_value(&self) -> String {
        self.kind.render(&self.value)
    }

    fn allowed_display(&self) -> String {
        self.allowed
            .iter()
            .map(|v| self.kind.render(v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_secret() && !self.file_value().is_empty() {
            f.write_str("********")
        } else {
            f.write_str(&self.file_value())
        }
    }
}

/// Typed description of an option to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub kind: InputKind,
    pub value: Value,
    pub label: Option<String>,
    pub desc: Option<String>,
    pub allowed: Vec<Value>,
}

impl OptionSpec {
    /// A string option with the given initial value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            kind: InputKind::Str,
            value: value.into(),
            label: None,
            desc: None,
            allowed: Vec::new(),
        }
    }

    pub fn kind(mut self, kind: InputKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn desc(mut self, desc: &str) -> Self {
        self.desc = Some(desc.to_string());
        self
    }

    pub fn allowed<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<ConfigOption> {
        ConfigOption::new(self.kind, self.value, self.label, self.desc, self.allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_value_and_default() {
        let opt = OptionSpec::new("30").kind(InputKind::Int).build().unwrap();
        assert_eq!(opt.get(), &Value::Int(30));
        assert_eq!(opt.get_default(), &Value::Int(30));
        assert_eq!(opt.kind(), InputKind::Int);
    }

    #[test]
    fn test_new_rejects_bad_value() {
        let result = OptionSpec::new("abc").kind(InputKind::Int).build();
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_new_rejects_default_outside_allowed() {
        let result = OptionSpec::new("medium").allowed(["fast", "slow"]).build();
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_allowed_values_are_normalized() {
        let opt = OptionSpec::new(1)
            .kind(InputKind::Int)
            .allowed(["1", " 2 ", "3"])
            .build()
            .unwrap();
        assert_eq!(opt.allowed(), &[Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_set_outside_allowed_keeps_value() {
        let mut opt = OptionSpec::new("fast").allowed(["fast", "slow"]).build().unwrap();
        assert!(matches!(opt.set("turbo"), Err(ConfigError::InvalidValue(_))));
        assert_eq!(opt.get(), &Value::from("fast"));
        assert!(opt.set("slow").unwrap());
        assert_eq!(opt.get(), &Value::from("slow"));
    }

    #[test]
    fn test_set_same_value_reports_unchanged() {
        let mut opt = OptionSpec::new("30").kind(InputKind::Int).build().unwrap();
        assert!(!opt.set(" 30").unwrap());
        assert!(!opt.set(30).unwrap());
        assert!(opt.set(31).unwrap());
    }

    #[test]
    fn test_reset_restores_default() {
        let mut opt = OptionSpec::new(true).kind(InputKind::Bool).build().unwrap();
        opt.set("no").unwrap();
        assert_eq!(opt.get(), &Value::Bool(false));
        assert!(opt.reset());
        assert_eq!(opt.get(), &Value::Bool(true));
        assert!(!opt.reset());
    }

    #[test]
    fn test_password_display_is_masked() {
        let opt = OptionSpec::new("hunter2").kind(InputKind::Password).build().unwrap();
        assert_eq!(opt.to_string(), "********");
        assert_eq!(opt.file_value(), "hunter2");
    }
}
