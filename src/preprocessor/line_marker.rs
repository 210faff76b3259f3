use crate::CheckError;
use crate::preprocessor::{DirectiveHandler, PreprocessorState, unquote};

/// Handler for GCC line markers: `# <line> ["<file>" [flags...]]`
///
/// Flag 3 marks the following text as coming from a system header.
pub struct LineMarkerDirective;

/// Handler for `#line <line> ["<file>"]`
pub struct LineDirective;

/// Largest line number a line marker may name, as for `#line` in C
const MAX_LINE_NUMBER: usize = 2_147_483_647;

struct LineOperands {
    line: usize,
    file: Option<String>,
    flags: Vec<u32>,
}

fn parse_operands(line: &str) -> Result<LineOperands, CheckError> {
    let line = line.trim();
    let digits_end = line
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(line.len());
    let digits = &line[..digits_end];
    if digits.is_empty() {
        return Err(CheckError::ParseDirectiveError(format!(
            "Missing line number in '{line}'"
        )));
    }
    let number = digits
        .parse::<usize>()
        .ok()
        .filter(|n| *n <= MAX_LINE_NUMBER)
        .ok_or_else(|| {
            CheckError::ParseDirectiveError(format!("Line number {digits} is out of range"))
        })?;

    let rest = line[digits_end..].trim_start();
    if rest.is_empty() {
        return Ok(LineOperands {
            line: number,
            file: None,
            flags: Vec::new(),
        });
    }

    let (file, rest) = unquote(rest).ok_or_else(|| {
        CheckError::ParseDirectiveError(format!("Expected a quoted file name in '{line}'"))
    })?;

    let flags = rest
        .split_whitespace()
        .map(|flag| {
            flag.parse::<u32>().map_err(|_| {
                CheckError::ParseDirectiveError(format!("Invalid line marker flag '{flag}'"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LineOperands {
        line: number,
        file: Some(file),
        flags,
    })
}

impl DirectiveHandler for LineMarkerDirective {
    fn process(&self, line: &str, state: &mut PreprocessorState) -> Result<(), CheckError> {
        let operands = parse_operands(line)?;
        let marker_line = state.physical_line;
        let current = state.line_map.lookup(marker_line);
        let file = operands
            .file
            .unwrap_or_else(|| current.file.to_string());
        let is_system = operands.flags.contains(&3);
        state
            .line_map
            .add_entry(marker_line, &file, operands.line, is_system);
        Ok(())
    }
}

impl DirectiveHandler for LineDirective {
    fn process(&self, line: &str, state: &mut PreprocessorState) -> Result<(), CheckError> {
        let operands = parse_operands(line)?;
        if !operands.flags.is_empty() {
            return Err(CheckError::ParseDirectiveError(format!(
                "Unexpected tokens after #line file name: '{line}'"
            )));
        }
        let marker_line = state.physical_line;
        let current = state.line_map.lookup(marker_line);
        let file = operands
            .file
            .unwrap_or_else(|| current.file.to_string());
        let is_system = current.is_system;
        state
            .line_map
            .add_entry(marker_line, &file, operands.line, is_system);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::CheckError;
    use crate::preprocessor::preprocess;

    #[test]
    fn line_directive_renumbers_and_renames() {
        let result = preprocess("int a;\n#line 100 \"gen.c\"\nint b;\nint c;", "main.c").unwrap();
        let b = result.line_map.lookup(3);
        assert_eq!((b.file, b.line), ("gen.c", 100));
        let c = result.line_map.lookup(4);
        assert_eq!((c.file, c.line), ("gen.c", 101));
    }

    #[test]
    fn line_directive_without_file_keeps_current_file() {
        let result = preprocess("#line 20\nint b;", "main.c").unwrap();
        let b = result.line_map.lookup(2);
        assert_eq!((b.file, b.line), ("main.c", 20));
    }

    #[test]
    fn marker_without_system_flag_is_user_code() {
        let result = preprocess("# 3 \"lib.h\" 1\nint b;", "main.c").unwrap();
        assert!(!result.line_map.lookup(2).is_system);
    }

    #[test]
    fn malformed_markers_are_rejected() {
        assert!(matches!(
            preprocess("#line abc", "main.c"),
            Err(CheckError::ParseDirectiveError(_))
        ));
        assert!(matches!(
            preprocess("# 4 lib.h", "main.c"),
            Err(CheckError::ParseDirectiveError(_))
        ));
        assert!(matches!(
            preprocess("# 4 \"lib.h\" x", "main.c"),
            Err(CheckError::ParseDirectiveError(_))
        ));
    }

    #[test]
    fn out_of_range_line_numbers_are_rejected() {
        for source in [
            "# 18446744073709551615 \"x.h\"\nint a;\nint b;\n",
            "#line 2147483648\nint a;\n",
            "#line 99999999999999999999999\nint a;\n",
        ] {
            match preprocess(source, "main.c") {
                Err(CheckError::ParseDirectiveError(message)) => {
                    assert!(message.contains("out of range"), "{message}");
                }
                other => panic!("Expected ParseDirectiveError, got {other:?}"),
            }
        }

        let result = preprocess("#line 2147483647\nint a;\n", "main.c").unwrap();
        assert_eq!(result.line_map.lookup(2).line, 2_147_483_647);
    }
}
