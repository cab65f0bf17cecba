use cfgtree_config::{ConfigOption, Entry, Section, Store};
use serde_json::{Map, Value as JsonValue, json};

const MASK: &str = "********";

pub(super) fn cmd_show(store: &Store, path: &str, as_json: bool, reveal: bool) -> cfgtree_core::Result<()> {
    store.read(|root| {
        let section = root.section_at(path)?;
        if as_json {
            let tree = section_json(section, reveal);
            println!("{}", serde_json::to_string_pretty(&tree).unwrap_or_default());
            return Ok(());
        }

        println!("📋 {} (version {})", store.path().display(), store.version());
        if section.is_empty() {
            println!("   (empty)");
        }
        print_section(section, 1, reveal);
        Ok(())
    })
}

fn option_text(option: &ConfigOption, reveal: bool) -> String {
    if reveal {
        option.file_value()
    } else {
        option.to_string()
    }
}

fn print_section(section: &Section, depth: usize, reveal: bool) {
    let indent = "   ".repeat(depth);
    for (name, entry) in section.iter() {
        match entry {
            Entry::Option(option) => {
                let mut line = format!("{indent}{name} = {}", option_text(option, reveal));
                line.push_str(&format!("  [{}]", option.kind()));
                if !option.desc.is_empty() {
                    line.push_str(&format!("  # {}", option.desc));
                }
                println!("{line}");
            }
            Entry::Section(child) => {
                if child.desc.is_empty() {
                    println!("{indent}[{name}] {}", child.label);
                } else {
                    println!("{indent}[{name}] {}  # {}", child.label, child.desc);
                }
                print_section(child, depth + 1, reveal);
            }
        }
    }
}

fn section_json(section: &Section, reveal: bool) -> JsonValue {
    let mut map = Map::new();
    for (name, entry) in section.iter() {
        let value = match entry {
            Entry::Option(option) if option.kind().is_secret() && !reveal => json!(MASK),
            Entry::Option(option) => serde_json::to_value(option.get()).unwrap_or(JsonValue::Null),
            Entry::Section(child) => section_json(child, reveal),
        };
        map.insert(name.to_string(), value);
    }
    JsonValue::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgtree_config::{InputKind, OptionSpec, SectionSpec};

    fn sample() -> Section {
        let mut root = Section::root();
        root.add_option("timeout", OptionSpec::new(30).kind(InputKind::Int))
            .unwrap();
        root.add_section(
            "auth",
            SectionSpec::new().option("token", OptionSpec::new("s3cret").kind(InputKind::Password)),
        )
        .unwrap();
        root
    }

    #[test]
    fn test_section_json_nests_and_masks() {
        let tree = section_json(&sample(), false);
        assert_eq!(tree["timeout"], json!(30));
        assert_eq!(tree["auth"]["token"], json!(MASK));
    }

    #[test]
    fn test_section_json_reveal() {
        let tree = section_json(&sample(), true);
        assert_eq!(tree["auth"]["token"], json!("s3cret"));
    }

    #[test]
    fn test_option_text_masks_passwords() {
        let root = sample();
        let token = root.section_at("auth").unwrap().get_option("token").unwrap();
        assert_eq!(option_text(token, false), MASK);
        assert_eq!(option_text(token, true), "s3cret");
    }
}
