use weft_core::Token;
use weft_core::error::Error;

use crate::compile::Compiler;

/// A named compile-time construct dispatched on the leading word of a
/// syntax tag.
///
/// Blocks compile themselves by calling back into the compiler: they parse
/// their signature, subcompile their body tokens and emit instructions
/// into the output buffer. The registry lives on the template context, so
/// a block can privately register helper blocks (`elseif`, `break`) that
/// are only visible inside its own body scope.
pub trait Block: Send + Sync {
    /// The tag name this block is registered under.
    fn name(&self) -> &'static str;

    /// Whether text follows the name before any body.
    fn has_signature(&self) -> bool {
        false
    }

    /// Whether the block requires a matching `{/name}` end tag.
    fn needs_close(&self) -> bool {
        false
    }

    /// Compile one occurrence. `body` is the token run between the tag
    /// and its end tag when [`needs_close`](Self::needs_close) is set.
    fn compile(
        &self,
        compiler: &mut Compiler<'_>,
        signature: &str,
        body: Option<&[Token]>,
    ) -> Result<(), Error>;
}
