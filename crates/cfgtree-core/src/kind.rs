//! The closed set of option value kinds and their normalization rules.
//!
//! Every kind maps an arbitrary [`Value`] to its canonical representation
//! ([`InputKind::normalize`]) and back to the plain text stored in the
//! configuration file ([`InputKind::render`]). For every canonical value `v`,
//! `normalize(Value::Str(render(v))) == v`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::error::{ConfigError, Result};
use crate::value::{Address, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    #[default]
    Str,
    Int,
    Bool,
    Float,
    Octal,
    Size,
    Password,
    File,
    Folder,
    Address,
    Bytes,
    StrList,
}

impl InputKind {
    pub const ALL: [InputKind; 12] = [
        InputKind::Str,
        InputKind::Int,
        InputKind::Bool,
        InputKind::Float,
        InputKind::Octal,
        InputKind::Size,
        InputKind::Password,
        InputKind::File,
        InputKind::Folder,
        InputKind::Address,
        InputKind::Bytes,
        InputKind::StrList,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InputKind::Str => "str",
            InputKind::Int => "int",
            InputKind::Bool => "bool",
            InputKind::Float => "float",
            InputKind::Octal => "octal",
            InputKind::Size => "size",
            InputKind::Password => "password",
            InputKind::File => "file",
            InputKind::Folder => "folder",
            InputKind::Address => "address",
            InputKind::Bytes => "bytes",
            InputKind::StrList => "strlist",
        }
    }

    /// Whether values of this kind should be masked when displayed.
    pub fn is_secret(self) -> bool {
        matches!(self, InputKind::Password)
    }

    /// Convert `raw` into the canonical value for this kind.
    pub fn normalize(self, raw: Value) -> Result<Value> {
        match self {
            InputKind::Str | InputKind::Password => to_text(raw).map(Value::Str),
            InputKind::Int => to_int(raw).map(Value::Int),
            InputKind::Bool => to_bool(raw).map(Value::Bool),
            InputKind::Float => to_float(raw).map(Value::Float),
            InputKind::Octal => to_octal(raw).map(Value::Int),
            InputKind::Size => to_size(raw).map(Value::Int),
            InputKind::File | InputKind::Folder => to_path(raw).map(Value::Path),
            InputKind::Address => to_address(raw).map(Value::Address),
            InputKind::Bytes => to_bytes(raw).map(Value::Bytes),
            InputKind::StrList => to_list(raw).map(Value::List),
        }
    }

    /// Plain-text file representation of a canonical value.
    pub fn render(self, value: &Value) -> String {
        match (self, value) {
            (InputKind::Octal, Value::Int(n)) => format!("0o{n:o}"),
            _ => value.to_string(),
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InputKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        let aliases = match wanted.as_str() {
            "string" | "text" => "str",
            "integer" => "int",
            "boolean" => "bool",
            "bytesize" => "size",
            "dir" | "directory" => "folder",
            "list" => "strlist",
            other => other,
        };
        InputKind::ALL
            .into_iter()
            .find(|k| k.name() == aliases)
            .ok_or_else(|| ConfigError::InvalidValue(format!("unknown input kind `{s}`")))
    }
}

fn to_text(raw: Value) -> Result<String> {
    match raw {
        Value::Str(s) => Ok(s),
        Value::Bytes(b) => String::from_utf8(b)
            .map_err(|_| ConfigError::invalid("bytes are not valid UTF-8")),
        Value::Path(p) => Ok(p.to_string_lossy().into_owned()),
        other => Ok(other.to_string()),
    }
}

fn to_int(raw: Value) -> Result<i64> {
    match raw {
        Value::Int(n) => Ok(n),
        Value::Bool(b) => Ok(i64::from(b)),
        Value::Float(x) if x.is_finite() && x.abs() < i64::MAX as f64 => Ok(x.trunc() as i64),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidValue(format!("`{s}` is not an integer"))),
        other => Err(not_convertible(&other, "integer")),
    }
}

fn to_bool(raw: Value) -> Result<bool> {
    match raw {
        Value::Bool(b) => Ok(b),
        Value::Int(n) => Ok(n != 0),
        Value::Float(x) => Ok(x != 0.0),
        Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" | "" => Ok(false),
            _ => Err(ConfigError::InvalidValue(format!("`{s}` is not a boolean"))),
        },
        other => Err(not_convertible(&other, "boolean")),
    }
}

fn to_float(raw: Value) -> Result<f64> {
    let x = match raw {
        Value::Float(x) => x,
        Value::Int(n) => n as f64,
        Value::Bool(b) => f64::from(u8::from(b)),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidValue(format!("`{s}` is not a number")))?,
        other => return Err(not_convertible(&other, "float")),
    };
    if x.is_finite() {
        Ok(x)
    } else {
        Err(ConfigError::InvalidValue(format!("{x} is not a finite number")))
    }
}

fn to_octal(raw: Value) -> Result<i64> {
    match raw {
        Value::Int(n) if n >= 0 => Ok(n),
        Value::Str(s) => {
            let digits = s.trim();
            let digits = digits
                .strip_prefix("0o")
                .or_else(|| digits.strip_prefix("0O"))
                .unwrap_or(digits);
            if digits.is_empty() || !digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
                return Err(ConfigError::InvalidValue(format!("`{s}` is not an octal number")));
            }
            i64::from_str_radix(digits, 8)
                .map_err(|_| ConfigError::InvalidValue(format!("`{s}` is out of range")))
        }
        other => Err(not_convertible(&other, "octal number")),
    }
}

/// Parse byte sizes such as `512`, `4k`, `10MB` or `1.5 GiB` (1024-based units).
fn to_size(raw: Value) -> Result<i64> {
    match raw {
        Value::Int(n) if n >= 0 => Ok(n),
        Value::Float(x) if x.is_finite() && x >= 0.0 && x.round() < i64::MAX as f64 => {
            Ok(x.round() as i64)
        }
        Value::Str(s) => {
            let text = s.trim();
            let invalid = || ConfigError::InvalidValue(format!("`{s}` is not a byte size"));
            let split = text
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(text.len());
            let (number, unit) = text.split_at(split);
            let number: f64 = number.parse().map_err(|_| invalid())?;

            let unit = unit.trim().to_ascii_lowercase();
            let unit = unit
                .strip_suffix("bytes")
                .or_else(|| unit.strip_suffix("byte"))
                .unwrap_or(unit.as_str());
            let unit = unit.strip_suffix('b').unwrap_or(unit);
            let unit = unit.strip_suffix('i').unwrap_or(unit);
            let shift = match unit {
                "" => 0,
                "k" => 10,
                "m" => 20,
                "g" => 30,
                "t" => 40,
                "p" => 50,
                _ => return Err(invalid()),
            };

            let bytes = (number * (1u64 << shift) as f64).round();
            if bytes.is_finite() && bytes < i64::MAX as f64 {
                Ok(bytes as i64)
            } else {
                Err(invalid())
            }
        }
        other => Err(not_convertible(&other, "byte size")),
    }
}

fn to_path(raw: Value) -> Result<PathBuf> {
    let path = match raw {
        Value::Path(p) => p,
        Value::Str(s) => PathBuf::from(s.trim()),
        other => return Err(not_convertible(&other, "path")),
    };
    if path.as_os_str().is_empty() {
        return Ok(path);
    }
    fullpath(&path)
}

/// Expand `~`, anchor relative paths at the working directory and drop
/// `.`/`..` components lexically.
fn fullpath(path: &Path) -> Result<PathBuf> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

fn to_address(raw: Value) -> Result<Address> {
    match raw {
        // Checked through the text form so that what is saved parses back.
        Value::Address(a) => match a.to_string().parse::<Address>() {
            Ok(parsed) if parsed == a => Ok(parsed),
            _ => Err(ConfigError::InvalidValue(format!("`{a}` is not a host:port address"))),
        },
        Value::Str(s) => s.parse(),
        other => Err(not_convertible(&other, "address")),
    }
}

fn to_bytes(raw: Value) -> Result<Vec<u8>> {
    match raw {
        Value::Bytes(b) => match String::from_utf8(b) {
            Ok(text) => Ok(text.into_bytes()),
            Err(_) => Err(ConfigError::invalid("bytes are not valid UTF-8")),
        },
        other => to_text(other).map(String::into_bytes),
    }
}

fn to_list(raw: Value) -> Result<Vec<String>> {
    let items = match raw {
        Value::List(items) => items,
        other => vec![to_text(other)?],
    };
    // Items holding a separator are split so the stored text reads back the same.
    Ok(items
        .iter()
        .flat_map(|item| item.split([',', '\n']))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect())
}

fn not_convertible(value: &Value, target: &str) -> ConfigError {
    ConfigError::InvalidValue(format!("cannot convert {} `{value}` to {target}", value.type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(kind: InputKind, raw: &str) -> Result<Value> {
        kind.normalize(Value::from(raw))
    }

    #[test]
    fn test_int_parses_and_rejects() {
        assert_eq!(norm(InputKind::Int, " 30 ").unwrap(), Value::Int(30));
        assert_eq!(InputKind::Int.normalize(Value::Float(3.9)).unwrap(), Value::Int(3));
        assert!(matches!(norm(InputKind::Int, "thirty"), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_bool_words() {
        assert_eq!(norm(InputKind::Bool, "Yes").unwrap(), Value::Bool(true));
        assert_eq!(norm(InputKind::Bool, "off").unwrap(), Value::Bool(false));
        assert_eq!(norm(InputKind::Bool, "").unwrap(), Value::Bool(false));
        assert!(norm(InputKind::Bool, "maybe").is_err());
    }

    #[test]
    fn test_float_rejects_nan() {
        assert_eq!(norm(InputKind::Float, "0.5").unwrap(), Value::Float(0.5));
        assert!(norm(InputKind::Float, "NaN").is_err());
    }

    #[test]
    fn test_octal() {
        assert_eq!(norm(InputKind::Octal, "0o755").unwrap(), Value::Int(0o755));
        assert_eq!(norm(InputKind::Octal, "0644").unwrap(), Value::Int(0o644));
        assert_eq!(InputKind::Octal.render(&Value::Int(0o755)), "0o755");
        assert!(norm(InputKind::Octal, "9").is_err());
    }

    #[test]
    fn test_size_units() {
        assert_eq!(norm(InputKind::Size, "512").unwrap(), Value::Int(512));
        assert_eq!(norm(InputKind::Size, "4k").unwrap(), Value::Int(4096));
        assert_eq!(norm(InputKind::Size, "10MB").unwrap(), Value::Int(10 << 20));
        assert_eq!(norm(InputKind::Size, "1.5 GiB").unwrap(), Value::Int(3 << 29));
        assert!(norm(InputKind::Size, "10 parsecs").is_err());
        assert!(norm(InputKind::Size, "MB").is_err());
        assert!(InputKind::Size.normalize(Value::Float(1e30)).is_err());
        assert!(InputKind::Size.normalize(Value::Float(-1.0)).is_err());
    }

    #[test]
    fn test_address_comma_form() {
        assert_eq!(
            norm(InputKind::Address, "localhost,9666").unwrap(),
            Value::Address(Address::new("localhost", 9666))
        );
        assert_eq!(
            InputKind::Address.render(&Value::Address(Address::new("localhost", 9666))),
            "localhost:9666"
        );
        assert!(norm(InputKind::Address, "localhost").is_err());
    }

    #[test]
    fn test_address_value_is_validated() {
        let ok = Value::Address(Address::new("example.org", 8080));
        assert_eq!(InputKind::Address.normalize(ok.clone()).unwrap(), ok);
        for bad in [Address::new("bad host", 0), Address::new("", 80), Address::new("a,b", 1)] {
            assert!(matches!(
                InputKind::Address.normalize(Value::Address(bad)),
                Err(ConfigError::InvalidValue(_))
            ));
        }
    }

    #[test]
    fn test_bytes_must_be_utf8() {
        assert_eq!(
            InputKind::Bytes.normalize(Value::Bytes(b"ok".to_vec())).unwrap(),
            Value::Bytes(b"ok".to_vec())
        );
        assert!(matches!(
            InputKind::Bytes.normalize(Value::Bytes(vec![0xff])),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_strlist_splits_and_trims() {
        assert_eq!(
            norm(InputKind::StrList, " a, b ,,c ").unwrap(),
            Value::List(vec!["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(norm(InputKind::StrList, "").unwrap(), Value::List(vec![]));
    }

    #[test]
    fn test_strlist_splits_list_items() {
        let raw = Value::List(vec!["a,b".into(), " c\nd ".into(), String::new()]);
        assert_eq!(
            InputKind::StrList.normalize(raw).unwrap(),
            Value::from(vec!["a", "b", "c", "d"])
        );
    }

    #[test]
    fn test_path_is_absolute_and_clean() {
        let v = norm(InputKind::File, "/var/lib/../log/./app.log").unwrap();
        assert_eq!(v, Value::Path(PathBuf::from("/var/log/app.log")));
        let rel = norm(InputKind::Folder, "downloads/").unwrap();
        assert!(rel.as_path().unwrap().is_absolute());
        assert!(rel.as_path().unwrap().ends_with("downloads"));
        assert_eq!(norm(InputKind::File, "").unwrap(), Value::Path(PathBuf::new()));
    }

    #[test]
    fn test_str_accepts_scalars() {
        assert_eq!(InputKind::Str.normalize(Value::Int(7)).unwrap(), Value::from("7"));
        assert_eq!(InputKind::Password.normalize(Value::from("s3cret")).unwrap(), Value::from("s3cret"));
        assert!(InputKind::Password.is_secret());
    }

    #[test]
    fn test_render_then_normalize_is_identity() {
        let samples = [
            (InputKind::Str, Value::from("hello world")),
            (InputKind::Int, Value::Int(-42)),
            (InputKind::Bool, Value::Bool(true)),
            (InputKind::Float, Value::Float(0.1)),
            (InputKind::Octal, Value::Int(0o700)),
            (InputKind::Size, Value::Int(1 << 20)),
            (InputKind::File, Value::Path(PathBuf::from("/tmp/x.conf"))),
            (InputKind::Address, Value::Address(Address::new("::1", 80))),
            (InputKind::Bytes, Value::Bytes(b"raw".to_vec())),
            (InputKind::StrList, Value::from(vec!["a", "b"])),
            (InputKind::StrList, Value::from(vec!["a,b", "c"])),
            (InputKind::Address, Value::Address(Address::new("example.org", 443))),
        ];
        for (kind, value) in samples {
            let value = kind.normalize(value).unwrap();
            let text = kind.render(&value);
            assert_eq!(kind.normalize(Value::Str(text)).unwrap(), value, "kind {kind}");
        }
    }

    #[test]
    fn test_kind_names_parse() {
        for kind in InputKind::ALL {
            assert_eq!(kind.name().parse::<InputKind>().unwrap(), kind);
        }
        assert_eq!("Integer".parse::<InputKind>().unwrap(), InputKind::Int);
        assert!("matrix".parse::<InputKind>().is_err());
    }

    #[test]
    fn test_kind_serde_lowercase() {
        let json = serde_json::to_string(&InputKind::StrList).unwrap();
        assert_eq!(json, "\"strlist\"");
    }
}
