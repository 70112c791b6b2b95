//! Fixture pairs live in `tests/fixtures/`: `<name>.html` holds the markup
//! and `<name>.txt` the flat text it must produce. Each pair becomes a
//! `#[test] fn <name>()` in `$OUT_DIR/fixture_tests.rs`, which
//! `tests/fixtures.rs` includes next to its `fixture_test` helper.

use std::fs;
use std::io;
use std::path::Path;

const FIXTURE_DIR: &str = "tests/fixtures";

/// Names of the markup fixtures, sorted. A markup file without its flat
/// text counterpart is a build error.
fn fixture_pairs(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let markup = entry?.path();
        if markup.extension().is_none_or(|e| e != "html") {
            continue;
        }
        let Some(name) = markup.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !markup.with_extension("txt").is_file() {
            return Err(io::Error::other(format!(
                "{} has no matching {name}.txt",
                markup.display()
            )));
        }
        names.push(name.to_string());
    }
    names.sort();
    Ok(names)
}

fn render(names: &[String]) -> String {
    let mut tests = String::from("mod markup_fixtures {\n    use super::fixture_test;\n");
    for name in names {
        tests.push_str(&format!(
            "\n    #[test]\n    fn {name}() {{\n        fixture_test(\"{name}\");\n    }}\n"
        ));
    }
    tests.push_str("}\n");
    tests
}

fn main() -> io::Result<()> {
    let out_dir = std::env::var("OUT_DIR").map_err(io::Error::other)?;
    let names = fixture_pairs(Path::new(FIXTURE_DIR))?;
    fs::write(Path::new(&out_dir).join("fixture_tests.rs"), render(&names))?;

    println!("cargo::rerun-if-changed={FIXTURE_DIR}");
    Ok(())
}
