use crate::CheckError;
use crate::preprocessor::{DirectiveHandler, PreprocessorState};
use log::debug;

/// Handler for `#pragma`. Only `system_header` has an effect; other pragmas are ignored.
pub struct PragmaDirective;

impl DirectiveHandler for PragmaDirective {
    fn process(&self, line: &str, state: &mut PreprocessorState) -> Result<(), CheckError> {
        let mut words = line.split_whitespace();
        let first = words.next();
        let second = words.next();

        let is_system_header = match (first, second) {
            (Some("system_header"), _) => true,
            (Some("GCC" | "clang"), Some("system_header")) => true,
            _ => false,
        };
        if !is_system_header {
            debug!("ignoring #pragma {line}");
            return Ok(());
        }

        let marker_line = state.physical_line;
        let current = state.line_map.lookup(marker_line);
        let (file, next_line) = (current.file.to_string(), current.line + 1);
        state.line_map.add_entry(marker_line, &file, next_line, true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::preprocessor::preprocess;

    #[test]
    fn system_header_pragma_marks_rest_of_file() {
        let source = "int a;\n#pragma GCC system_header\nint b;\nint c;";
        let result = preprocess(source, "vendor.h").unwrap();
        assert!(!result.line_map.lookup(1).is_system);
        let b = result.line_map.lookup(3);
        assert!(b.is_system);
        assert_eq!((b.file, b.line), ("vendor.h", 3));
        assert!(result.line_map.lookup(4).is_system);
    }

    #[test]
    fn other_pragmas_are_ignored() {
        let result = preprocess("#pragma once\nint a;", "main.c").unwrap();
        assert!(!result.line_map.lookup(2).is_system);
        assert!(result.line_map.entries().is_empty());
    }
}
