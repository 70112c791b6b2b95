use anyhow::{Context, Result, bail};
use std::{env, ops::Range, path::PathBuf, process};
use weft_config::{Config, Stage};
use weft_engine::{
    Cmd, Document, FlatText, ProcessorPipeline, RegexProcessor, SerializerOptions, Style,
    flat::RunContent,
};

const USAGE: &str = "Usage: weft <file.html> [--pretty] [--flat] [--json] [--config <path>]
            [--insert <at>=<text>] [--delete <start>..<end>]
            [--bold <start>..<end>] [--italic <start>..<end>]";

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    input: PathBuf,
    pretty: bool,
    flat: bool,
    /// Flat text as JSON instead of one line per run.
    json: bool,
    config: Option<PathBuf>,
    /// Applied in command-line order before printing.
    edits: Vec<Cmd>,
}

fn parse_range(value: &str) -> Result<Range<usize>> {
    let (start, end) = value
        .split_once("..")
        .with_context(|| format!("expected <start>..<end>, got {value:?}"))?;
    Ok(start.parse()?..end.parse()?)
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args::default();
    let mut input = None;
    let mut rest = args.iter();

    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--pretty" => parsed.pretty = true,
            "--flat" => parsed.flat = true,
            "--json" => parsed.json = true,
            "--config" => {
                let path = rest.next().context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            option @ ("--insert" | "--delete" | "--bold" | "--italic") => {
                let value = rest
                    .next()
                    .with_context(|| format!("{option} needs a value"))?;
                let edit = match option {
                    "--insert" => {
                        let (at, text) = value
                            .split_once('=')
                            .with_context(|| format!("expected <at>=<text>, got {value:?}"))?;
                        let at: usize = at.parse()?;
                        Cmd::ReplaceText {
                            range: at..at,
                            text: text.to_string(),
                        }
                    }
                    "--delete" => Cmd::Delete {
                        range: parse_range(value)?,
                    },
                    "--bold" => Cmd::ToggleStyle {
                        range: parse_range(value)?,
                        style: Style::Bold,
                    },
                    _ => Cmd::ToggleStyle {
                        range: parse_range(value)?,
                        style: Style::Italic,
                    },
                };
                parsed.edits.push(edit);
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            path if input.is_none() => input = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument {extra}"),
        }
    }

    parsed.input = input.context("no input file given")?;
    Ok(parsed)
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let loaded = match path {
        Some(path) => Config::load_from_path(path)?
            .with_context(|| format!("config file '{}' not found", path.display()))?,
        None => Config::load()?.unwrap_or_default(),
    };
    Ok(loaded)
}

fn pipeline(config: &Config) -> Result<ProcessorPipeline> {
    let build = |stage: Stage| -> Result<Vec<RegexProcessor>> {
        config
            .processors_for(stage)
            .map(|rule| {
                RegexProcessor::new(&rule.pattern, rule.replacement.clone())
                    .map_err(anyhow::Error::from)
            })
            .collect()
    };
    Ok(ProcessorPipeline {
        input: build(Stage::Input)?,
        output: build(Stage::Output)?,
    })
}

/// One line per run: the run's text (attachments as their placeholder
/// character) and the attributes in effect.
fn describe_flat(flat: &FlatText) -> String {
    let mut out = String::new();
    for run in flat.runs() {
        let text = match &run.content {
            RunContent::Text(text) => text.clone(),
            RunContent::Attachment(attachment) => attachment.character().to_string(),
        };
        out.push_str(&format!("{text:?} {:?}\n", run.attributes));
    }
    out
}

fn run(args: &Args, config: &Config) -> Result<String> {
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("failed to read '{}'", args.input.display()))?;
    let html = String::from_utf8(bytes)
        .with_context(|| format!("'{}' is not valid UTF-8", args.input.display()))?;

    let mut document = Document::from_html_with_processors(&html, pipeline(config)?);
    log::info!(
        "loaded {} ({} flat units)",
        args.input.display(),
        document.len()
    );

    for edit in &args.edits {
        let len = document.len();
        let range = match edit {
            Cmd::ReplaceText { range, .. }
            | Cmd::Delete { range }
            | Cmd::ToggleStyle { range, .. } => range.clone(),
            _ => 0..0,
        };
        if range.start > range.end || range.end > len {
            bail!("range {range:?} is outside the document (length {len})");
        }
        document.apply(edit.clone());
    }

    if args.json {
        return serde_json::to_string_pretty(&document.flat_text())
            .context("failed to encode flat text");
    }
    if args.flat {
        return Ok(describe_flat(&document.flat_text()));
    }

    let options = SerializerOptions {
        pretty: args.pretty || config.serializer.pretty,
        indent: config.serializer.indent,
    };
    Ok(document.html_with(&options))
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("{USAGE}");
            process::exit(1);
        }
    };

    let config = load_config(args.config.as_ref())?;

    env_logger::Builder::from_default_env()
        .filter_level(
            config
                .log_level
                .parse()
                .unwrap_or(log::LevelFilter::Info),
        )
        .init();

    println!("{}", run(&args, &config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use weft_config::ProcessorRule;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let args = parse_args(&strings(&["doc.html", "--pretty", "--config", "c.toml"])).unwrap();
        assert_eq!(
            args,
            Args {
                input: PathBuf::from("doc.html"),
                pretty: true,
                flat: false,
                json: false,
                config: Some(PathBuf::from("c.toml")),
                edits: Vec::new(),
            }
        );
    }

    #[test]
    fn test_parse_edits() {
        let args = parse_args(&strings(&[
            "doc.html", "--insert", "3=hi", "--delete", "0..2", "--bold", "1..4",
        ]))
        .unwrap();
        assert_eq!(
            args.edits,
            vec![
                Cmd::ReplaceText {
                    range: 3..3,
                    text: "hi".to_string(),
                },
                Cmd::Delete { range: 0..2 },
                Cmd::ToggleStyle {
                    range: 1..4,
                    style: Style::Bold,
                },
            ]
        );
        assert!(parse_args(&strings(&["doc.html", "--delete", "2"])).is_err());
        assert!(parse_args(&strings(&["doc.html", "--insert", "x=1"])).is_err());
    }

    #[test]
    fn test_run_applies_edits() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("doc.html");
        std::fs::write(&input, "<p>Hello</p><p>World!</p>").unwrap();

        let args = Args {
            input,
            edits: vec![
                Cmd::Delete { range: 5..6 },
                Cmd::ToggleStyle {
                    range: 0..5,
                    style: Style::Bold,
                },
            ],
            ..Args::default()
        };
        assert_eq!(
            run(&args, &Config::default()).unwrap(),
            "<p><strong>Hello</strong>World!</p>"
        );

        let args = Args {
            edits: vec![Cmd::Delete { range: 0..99 }],
            ..args
        };
        assert!(run(&args, &Config::default()).is_err());
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(&[]).is_err());
        assert!(parse_args(&strings(&["a.html", "b.html"])).is_err());
        assert!(parse_args(&strings(&["a.html", "--config"])).is_err());
        assert!(parse_args(&strings(&["a.html", "--bogus"])).is_err());
    }

    #[test]
    fn test_run_with_processors() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("doc.html");
        std::fs::write(&input, "<p>[hr]</p>").unwrap();

        let config = Config {
            processors: vec![ProcessorRule {
                stage: Stage::Input,
                pattern: r"\[hr\]".to_string(),
                replacement: "<b>rule</b>".to_string(),
            }],
            ..Config::default()
        };
        let args = Args {
            input,
            ..Args::default()
        };

        assert_eq!(run(&args, &config).unwrap(), "<p><b>rule</b></p>");
    }

    #[test]
    fn test_run_flat() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("doc.html");
        std::fs::write(&input, "<p>ab</p><p><b>c</b></p>").unwrap();

        let args = Args {
            input,
            flat: true,
            ..Args::default()
        };
        let out = run(&args, &Config::default()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("\"ab\\n\" "));
        assert!(lines[1].starts_with("\"c\" "));
        assert!(lines[1].contains("bold: Some"));
    }

    #[test]
    fn test_run_json() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("doc.html");
        std::fs::write(
            &input,
            r#"<figure><img src="a.png"><figcaption>cap</figcaption></figure>"#,
        )
        .unwrap();

        let args = parse_args(&strings(&[input.to_str().unwrap(), "--json"])).unwrap();
        let out = run(&args, &Config::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        let runs = value["runs"].as_array().unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0]["content"]["attachment"]["type"], "image");
        assert_eq!(runs[0]["content"]["attachment"]["src"], "a.png");
        assert_eq!(
            runs[0]["attributes"]["paragraph"][0]["type"],
            "figure"
        );
        assert_eq!(runs[2]["content"]["text"], "cap");
        assert_eq!(
            runs[2]["attributes"]["paragraph"][1]["type"],
            "figcaption"
        );
    }

    #[test]
    fn test_run_missing_file() {
        let args = Args {
            input: PathBuf::from("/definitely/not/here.html"),
            ..Args::default()
        };
        assert!(run(&args, &Config::default()).is_err());
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let config = Config {
            processors: vec![ProcessorRule {
                stage: Stage::Output,
                pattern: "(".to_string(),
                replacement: String::new(),
            }],
            ..Config::default()
        };
        assert!(pipeline(&config).is_err());
    }
}
