//! Markup rewriting around the tree: input processors run on markup before
//! it is parsed, output processors on markup after it is serialized.

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("invalid processor pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Replaces every match of a pattern. The replacement may use `$1`/`$name`
/// capture references.
#[derive(Debug, Clone)]
pub struct RegexProcessor {
    regex: Regex,
    replacement: String,
}

impl RegexProcessor {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, ProcessorError> {
        let regex = Regex::new(pattern).map_err(|source| ProcessorError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            regex,
            replacement: replacement.into(),
        })
    }

    pub fn process(&self, markup: &str) -> String {
        self.regex
            .replace_all(markup, self.replacement.as_str())
            .into_owned()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessorPipeline {
    pub input: Vec<RegexProcessor>,
    pub output: Vec<RegexProcessor>,
}

impl ProcessorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty() && self.output.is_empty()
    }

    pub fn process_input(&self, markup: &str) -> String {
        run(&self.input, markup)
    }

    pub fn process_output(&self, markup: &str) -> String {
        run(&self.output, markup)
    }
}

fn run(processors: &[RegexProcessor], markup: &str) -> String {
    processors
        .iter()
        .fold(markup.to_string(), |markup, processor| processor.process(&markup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn test_replaces_every_match() {
        let processor = RegexProcessor::new(r"\[b\](.*?)\[/b\]", "<b>$1</b>").unwrap();
        assert_snapshot!(processor.process("[b]x[/b] and [b]y[/b]"), @"<b>x</b> and <b>y</b>");
    }

    #[test]
    fn test_invalid_pattern() {
        let error = RegexProcessor::new("(", "").unwrap_err();
        assert!(matches!(
            &error,
            ProcessorError::InvalidPattern { pattern, .. } if pattern == "("
        ));
        assert_snapshot!(error.to_string(), @r#"invalid processor pattern "(""#);
    }

    #[test]
    fn test_pipeline_runs_in_order() {
        let pipeline = ProcessorPipeline {
            input: vec![
                RegexProcessor::new("a", "b").unwrap(),
                RegexProcessor::new("b", "c").unwrap(),
            ],
            output: Vec::new(),
        };
        assert_eq!(pipeline.process_input("a"), "c");
        assert_eq!(pipeline.process_output("a"), "a");
        assert!(ProcessorPipeline::new().is_empty());
    }
}
