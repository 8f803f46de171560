//! C2: parser facade. `parse` is the only entry point the rest of the
//! engine calls; lexing and grammar details stay private to this module.

pub mod ast;
mod grammar;
pub(crate) mod lexer;

pub use ast::{Ast, BinOp, Block, Expr, FunctionBody, LogicalOp, Stmt, TableField, UnOp};
pub use lexer::Span;

use crate::error::Result;
use crate::path::FileKey;
use crate::source::SourceBuffer;

/// Parses `buffer`'s content into an [`Ast`]. On failure returns
/// `CoverageError::ParseError{file, line, column, message}` with the line
/// resolved via `buffer`'s prebuilt line-start index rather than a second
/// scan of the source.
pub fn parse(buffer: &SourceBuffer) -> Result<Ast> {
    let key = buffer.key().clone();
    let buffer_for_lines = buffer.clone();
    grammar::parse_source(buffer.bytes(), &key, move |offset| {
        buffer_for_lines.position_to_line(offset)
    })
}

/// Re-exposed for callers that already have a token offset and want a line
/// number without re-parsing.
pub fn position_to_line(buffer: &SourceBuffer, byte_offset: usize) -> u32 {
    buffer.position_to_line(byte_offset)
}
