mod line_marker;
mod pragma;

use crate::CheckError;
use crate::preprocessor::line_marker::{LineDirective, LineMarkerDirective};
use crate::preprocessor::pragma::PragmaDirective;
use log::trace;
use std::collections::HashMap;

/// Registry key of the GCC `# <line> "<file>" <flags>` form, which has no directive name
const LINE_MARKER: &str = "<line-marker>";

/// Directives that are accepted but have no effect on the analysed text
const IGNORED_DIRECTIVES: &[&str] = &[
    "include",
    "include_next",
    "import",
    "define",
    "undef",
    "if",
    "ifdef",
    "ifndef",
    "elif",
    "elifdef",
    "elifndef",
    "else",
    "endif",
    "error",
    "warning",
    "ident",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMapEntry {
    /// Physical line holding the marker; the mapping applies from the next line on
    pub marker_line: usize,
    pub file: String,
    pub presumed_line: usize,
    pub is_system: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresumedLine<'a> {
    pub file: &'a str,
    pub line: usize,
    pub is_system: bool,
}

/// Maps physical lines of the preprocessed text to presumed file/line pairs
#[derive(Debug, Clone)]
pub struct LineMap {
    main_file: String,
    entries: Vec<LineMapEntry>,
}

impl LineMap {
    pub fn new(main_file: &str) -> Self {
        LineMap {
            main_file: main_file.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn main_file(&self) -> &str {
        &self.main_file
    }

    pub fn entries(&self) -> &[LineMapEntry] {
        &self.entries
    }

    /// Entries must be added in increasing `marker_line` order
    pub fn add_entry(&mut self, marker_line: usize, file: &str, presumed_line: usize, is_system: bool) {
        self.entries.push(LineMapEntry {
            marker_line,
            file: file.to_string(),
            presumed_line,
            is_system,
        });
    }

    pub fn lookup(&self, physical_line: usize) -> PresumedLine<'_> {
        match self
            .entries
            .iter()
            .rev()
            .find(|entry| entry.marker_line < physical_line)
        {
            Some(entry) => PresumedLine {
                file: &entry.file,
                line: entry
                    .presumed_line
                    .saturating_add(physical_line - entry.marker_line - 1),
                is_system: entry.is_system,
            },
            None => PresumedLine {
                file: &self.main_file,
                line: physical_line,
                is_system: false,
            },
        }
    }
}

pub struct Preprocessor {
    directives: HashMap<String, Box<dyn DirectiveHandler>>,
    state: PreprocessorState,
}

pub struct PreprocessorState {
    /// Physical line of the directive being processed
    pub physical_line: usize,
    pub line_map: LineMap,
}

/// Text with every directive line blanked, plus the line mapping the directives described
#[derive(Debug, Clone)]
pub struct PreprocessedSource {
    pub text: String,
    pub line_map: LineMap,
}

impl Preprocessor {
    pub fn new(main_file: &str) -> Self {
        let mut p = Preprocessor {
            directives: HashMap::new(),
            state: PreprocessorState {
                physical_line: 0,
                line_map: LineMap::new(main_file),
            },
        };
        p.register_directive(LINE_MARKER, Box::new(LineMarkerDirective));
        p.register_directive("line", Box::new(LineDirective));
        p.register_directive("pragma", Box::new(PragmaDirective));
        for name in IGNORED_DIRECTIVES {
            p.register_directive(name, Box::new(IgnoredDirective));
        }
        p
    }

    pub fn register_directive(&mut self, name: &str, handler: Box<dyn DirectiveHandler>) {
        self.directives.insert(name.to_string(), handler);
    }

    pub fn process(mut self, input: &str) -> Result<PreprocessedSource, CheckError> {
        let mut content_lines = Vec::new();
        let mut continued = false;

        for (index, line) in input.split('\n').enumerate() {
            self.state.physical_line = index + 1;

            if continued {
                continued = line.trim_end().ends_with('\\');
                content_lines.push("");
                continue;
            }

            let trimmed_line = line.trim();
            let Some(directive_line) = trimmed_line.strip_prefix('#') else {
                content_lines.push(line);
                continue;
            };

            continued = trimmed_line.ends_with('\\');
            content_lines.push("");

            let directive_line = directive_line.trim_start();
            if directive_line.is_empty() {
                continue;
            }

            let (directive_name, rest) = if directive_line.starts_with(|c: char| c.is_ascii_digit()) {
                (LINE_MARKER, directive_line)
            } else {
                let end = directive_line
                    .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .unwrap_or(directive_line.len());
                (&directive_line[..end], directive_line[end..].trim())
            };

            match self.directives.get(directive_name) {
                Some(handler) => {
                    trace!("line {}: #{}", self.state.physical_line, directive_name);
                    handler.process(rest, &mut self.state)?;
                }
                None => {
                    return Err(CheckError::UnknownDirectiveError(directive_name.to_string()));
                }
            }
        }

        Ok(PreprocessedSource {
            text: content_lines.join("\n"),
            line_map: self.state.line_map,
        })
    }
}

pub trait DirectiveHandler {
    fn process(&self, line: &str, state: &mut PreprocessorState) -> Result<(), CheckError>;
}

/// Handler for directives the checker accepts without acting on them
pub struct IgnoredDirective;

impl DirectiveHandler for IgnoredDirective {
    fn process(&self, _line: &str, _state: &mut PreprocessorState) -> Result<(), CheckError> {
        Ok(())
    }
}

/// Strips the quotes from a `"file"` operand, `None` when the operand is not quoted
pub(crate) fn unquote(operand: &str) -> Option<(String, &str)> {
    let body = operand.strip_prefix('"')?;
    let mut file = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((file, &body[i + 1..])),
            '\\' => {
                let (_, escaped) = chars.next()?;
                file.push(escaped);
            }
            c => file.push(c),
        }
    }
    None
}

pub fn preprocess(input: &str, main_file: &str) -> Result<PreprocessedSource, CheckError> {
    Preprocessor::new(main_file).process(input)
}
