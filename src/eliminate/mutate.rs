//! Single-method removal from an interface body.
//!
//! The edit is a text splice over the original source: the method element's
//! byte span is cut out, together with its whole line when nothing but
//! whitespace or a line comment would remain. Every other byte of the file
//! is preserved, so the mutated file differs from the original by exactly
//! one method.

use crate::error::EliminationError;
use crate::extract::{InterfaceDeclaration, MethodEntry};

/// Source of `decl`'s file with `method` removed from its interface.
pub fn remove_method(
    source: &[u8],
    decl: &InterfaceDeclaration,
    method: &MethodEntry,
) -> Result<Vec<u8>, EliminationError> {
    let not_found = || EliminationError::MethodNotFound {
        path: decl.module_path.clone(),
        interface: decl.id.to_string(),
        method: method.name.clone(),
    };

    let span = method.span;
    let text = source.get(span.start..span.end).ok_or_else(not_found)?;
    if !starts_with_ident(text, method.name.as_bytes()) {
        return Err(not_found());
    }

    let line_start = source[..span.start]
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let line_end = source[span.end..]
        .iter()
        .position(|b| *b == b'\n')
        .map(|i| span.end + i)
        .unwrap_or(source.len());

    let before = &source[line_start..span.start];
    let after = &source[span.end..line_end];
    let rest = trim_ascii(after);

    let mut out = Vec::with_capacity(source.len());
    if trim_ascii(before).is_empty() && (rest.is_empty() || rest.starts_with(b"//")) {
        // Drop the whole line, newline included.
        out.extend_from_slice(&source[..line_start]);
        let resume = if line_end < source.len() {
            line_end + 1
        } else {
            line_end
        };
        out.extend_from_slice(&source[resume..]);
    } else {
        // Shares its line with other elements, e.g. `interface{ A(); B() }`.
        let mut end = span.end;
        let trailing_ws = after.iter().take_while(|b| **b == b' ' || **b == b'\t').count();
        if source.get(end + trailing_ws) == Some(&b';') {
            end += trailing_ws + 1;
            end += source[end..]
                .iter()
                .take_while(|b| **b == b' ' || **b == b'\t')
                .count();
        }
        out.extend_from_slice(&source[..span.start]);
        out.extend_from_slice(&source[end..]);
    }
    Ok(out)
}

fn starts_with_ident(text: &[u8], name: &[u8]) -> bool {
    text.starts_with(name)
        && text
            .get(name.len())
            .map(|b| !(b.is_ascii_alphanumeric() || *b == b'_'))
            .unwrap_or(true)
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|i| i + 1)
        .unwrap_or(start);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::syntax::Span;
    use crate::analysis::{FileRef, InterfaceShape, Position, Signature, TypeName};
    use crate::extract::InterfaceId;
    use std::path::PathBuf;

    fn entry(source: &str, name: &str, elem: &str) -> (InterfaceDeclaration, MethodEntry) {
        let start = source.find(elem).unwrap();
        let position = Position {
            file: "x.go".to_string(),
            line: 1,
        };
        let method = MethodEntry {
            name: name.to_string(),
            signature: Signature::default(),
            rendered: String::new(),
            position: position.clone(),
            span: Span {
                start,
                end: start + elem.len(),
            },
        };
        let decl = InterfaceDeclaration {
            id: InterfaceId {
                package: "example.com/m".to_string(),
                name: "Logger".to_string(),
                position,
            },
            type_name: TypeName::new("example.com/m", "Logger"),
            file: FileRef { unit: 0, file: 0 },
            module_path: PathBuf::from("x.go"),
            local: false,
            shape: InterfaceShape::default(),
            methods: Vec::new(),
        };
        (decl, method)
    }

    fn remove(source: &str, name: &str, elem: &str) -> String {
        let (decl, method) = entry(source, name, elem);
        String::from_utf8(remove_method(source.as_bytes(), &decl, &method).unwrap()).unwrap()
    }

    #[test]
    fn test_removes_whole_line() {
        let source = "package m\n\ntype Logger interface {\n\tLog(level string) error\n\tDebug(args ...string) // verbose only\n\t// Sync flushes.\n\tSync()\n}\n";
        assert_eq!(
            remove(source, "Debug", "Debug(args ...string)"),
            "package m\n\ntype Logger interface {\n\tLog(level string) error\n\t// Sync flushes.\n\tSync()\n}\n"
        );
    }

    #[test]
    fn test_removes_inline_element_and_separator() {
        let source = "package m\n\ntype Logger interface{ Log(); Debug(); Sync() }\n";
        assert_eq!(
            remove(source, "Debug", "Debug()"),
            "package m\n\ntype Logger interface{ Log(); Sync() }\n"
        );
        assert_eq!(
            remove(source, "Sync", "Sync()"),
            "package m\n\ntype Logger interface{ Log(); Debug();  }\n"
        );
    }

    #[test]
    fn test_leaves_embedded_entries() {
        let source = "package m\n\ntype RC interface {\n\tio.Reader\n\tClose() error\n}\n";
        assert_eq!(
            remove(source, "Close", "Close() error"),
            "package m\n\ntype RC interface {\n\tio.Reader\n}\n"
        );
    }

    #[test]
    fn test_span_mismatch_is_error() {
        let source = "package m\n\ntype Logger interface {\n\tLogf()\n}\n";
        let (decl, method) = entry(source, "Log", "Logf()");
        let err = remove_method(source.as_bytes(), &decl, &method).unwrap_err();
        assert!(matches!(err, EliminationError::MethodNotFound { .. }));
    }
}
