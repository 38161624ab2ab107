use std::mem;

use weft_core::error::{CompileError, Error};
use weft_core::ir::{Body, Expr, Instr, OverrideMode, RegionOverride, Template};
use weft_core::token::Token;
use weft_source::{ResourceLoader, SourceError};

use crate::scope::TemplateContext;
use crate::tokenize::tag_tokenizer;

use super::output::{OutputBuffer, OutputDisallowed};

/// Tracks one `extends` region while its body compiles.
enum ExtendsState {
    /// The parent was spliced inline; ancestor regions are searched from
    /// `boundary` onward so sibling branches never capture each other.
    Static { boundary: usize },
    /// The parent is a runtime expression; overrides are collected and
    /// deferred to a runtime extend instruction.
    Dynamic { overrides: Vec<RegionOverride> },
}

/// Collects the branches of an `if` while its body compiles. The private
/// `elseif`/`else` blocks split the current frame through the compiler.
struct BranchState {
    done: Vec<(Expr, Body)>,
    current: Option<Expr>,
    seen_else: bool,
}

/// Compiles one template source into an executable body.
///
/// A compiler is not reentrant: it holds the in-progress buffer and
/// resource/line position, and rejects a nested top-level [`compile`]
/// while one is in flight. Nested work (includes, extends parents) goes
/// through [`subcompile_resource`], which assumes an active compile.
///
/// [`compile`]: Compiler::compile
/// [`subcompile_resource`]: Compiler::subcompile_resource
pub struct Compiler<'a> {
    loader: &'a dyn ResourceLoader,
    context: TemplateContext,
    parents: Vec<TemplateContext>,
    buffer: OutputBuffer,
    resource: String,
    line: u32,
    include_stack: Vec<String>,
    dependencies: Vec<String>,
    extends: Vec<ExtendsState>,
    branches: Vec<BranchState>,
    extends_key: Option<String>,
    id_counter: usize,
    compiling: bool,
}

impl<'a> Compiler<'a> {
    /// Create a compiler over a resource loader and a context carrying
    /// the block/function/operator registries.
    pub fn new(loader: &'a dyn ResourceLoader, context: TemplateContext) -> Self {
        Self {
            loader,
            context,
            parents: Vec::new(),
            buffer: OutputBuffer::new(),
            resource: String::new(),
            line: 1,
            include_stack: Vec::new(),
            dependencies: Vec::new(),
            extends: Vec::new(),
            branches: Vec::new(),
            extends_key: None,
            id_counter: 0,
            compiling: false,
        }
    }

    /// Compile a template source into an executable artifact.
    pub fn compile(&mut self, resource: &str, source: &str) -> Result<Template, Error> {
        if self.compiling {
            return Err(CompileError::new(
                resource,
                0,
                "compiler is already in use; nested work must go through subcompile",
            )
            .into());
        }
        self.compiling = true;
        let result = self.compile_top(resource, source);
        self.compiling = false;
        result
    }

    fn compile_top(&mut self, resource: &str, source: &str) -> Result<Template, Error> {
        self.buffer = OutputBuffer::new();
        self.resource = resource.to_string();
        self.line = 1;
        self.include_stack = vec![resource.to_string()];
        self.dependencies = vec![resource.to_string()];
        self.extends = Vec::new();
        self.branches = Vec::new();
        self.extends_key = None;

        let tokens = self.tokenize_source(source)?;
        self.compile_tokens(&tokens)?;

        let body = mem::take(&mut self.buffer).finish();
        Ok(Template {
            resource: self.resource.clone(),
            body,
            dependencies: mem::take(&mut self.dependencies),
            extends_key: self.extends_key.take(),
        })
    }

    // ---- state shared with blocks ----------------------------------

    pub fn context(&self) -> &TemplateContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut TemplateContext {
        &mut self.context
    }

    /// The resource currently being compiled.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The current 1-indexed line.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// A compile error located at the current resource and line.
    pub fn error(&self, message: impl Into<String>) -> Error {
        CompileError::new(self.resource.clone(), self.line, message).into()
    }

    /// Advance the line counter past the newlines of consumed text.
    pub fn bump_lines(&mut self, text: &str) {
        self.line += text.bytes().filter(|&b| b == b'\n').count() as u32;
    }

    /// A fresh compiler-owned id for generated state slots.
    pub fn next_id(&mut self) -> usize {
        let id = self.id_counter;
        self.id_counter += 1;
        id
    }

    /// Enter a child scope; the previous scope is restored by
    /// [`leave_scope`](Self::leave_scope).
    pub fn enter_scope(&mut self) {
        let child = self.context.create_child();
        let parent = mem::replace(&mut self.context, child);
        self.parents.push(parent);
    }

    /// Return to the parent scope, merging functions and, when
    /// `keep_variables` is set, the variables of the child.
    pub fn leave_scope(&mut self, keep_variables: bool) {
        if let Some(parent) = self.parents.pop() {
            let child = mem::replace(&mut self.context, parent);
            self.context.absorb(child, keep_variables);
        }
    }

    // ---- emitting ---------------------------------------------------

    /// Append an instruction to the current frame.
    pub fn emit(&mut self, instr: Instr) -> Result<(), Error> {
        match self.buffer.push(instr) {
            Ok(()) => Ok(()),
            Err(OutputDisallowed) => Err(self.error("output not allowed inside `extends`")),
        }
    }

    fn emit_literal(&mut self, text: &str) -> Result<(), Error> {
        match self.buffer.push_literal(text) {
            Ok(()) => Ok(()),
            Err(OutputDisallowed) => Err(self.error("output not allowed inside `extends`")),
        }
    }

    /// Splice an already-compiled body inline into the current frame
    /// (static includes). Spliced content counts as printed output.
    pub fn splice_body(&mut self, body: Body) -> Result<(), Error> {
        if !self.buffer.output_allowed() {
            return Err(self.error("output not allowed inside `extends`"));
        }
        self.buffer.splice(body);
        Ok(())
    }

    /// Compile a token run into its own body, leaving the current frame
    /// untouched.
    pub fn compile_body(&mut self, tokens: &[Token]) -> Result<Body, Error> {
        self.buffer.push_frame();
        let result = self.compile_tokens(tokens);
        let body = self.buffer.pop_frame();
        result.map(|()| body)
    }

    /// Force or clear the output permission for a span of compilation.
    pub fn push_output_allowed(&mut self, allow: bool) {
        self.buffer.push_allow_output(allow);
    }

    pub fn pop_output_allowed(&mut self) {
        self.buffer.pop_allow_output();
    }

    // ---- branch collection (if/elseif/else) ------------------------

    /// Open a branch collector for an `if`; the body compiles into the
    /// first branch frame.
    pub fn begin_branches(&mut self, condition: Expr) {
        self.buffer.push_frame();
        self.branches.push(BranchState {
            done: Vec::new(),
            current: Some(condition),
            seen_else: false,
        });
    }

    /// Close the current branch and open the next one. `None` starts the
    /// else branch.
    pub fn split_branch(&mut self, condition: Option<Expr>) -> Result<(), Error> {
        if self.branches.is_empty() {
            return Err(self.error("`elseif`/`else` outside of `if`"));
        }
        if self.branches.last().is_some_and(|s| s.seen_else) {
            return Err(self.error("no further branches allowed after `else`"));
        }
        let body = self.buffer.pop_frame();
        if let Some(state) = self.branches.last_mut() {
            if let Some(done) = state.current.take() {
                state.done.push((done, body));
            }
            match condition {
                Some(cond) => state.current = Some(cond),
                None => state.seen_else = true,
            }
        }
        self.buffer.push_frame();
        Ok(())
    }

    /// Close the branch collector, returning the branches and else body.
    pub fn end_branches(&mut self) -> (Vec<(Expr, Body)>, Option<Body>) {
        let last = self.buffer.pop_frame();
        match self.branches.pop() {
            Some(mut state) => match state.current.take() {
                Some(cond) => {
                    state.done.push((cond, last));
                    (state.done, None)
                }
                None => (state.done, Some(last)),
            },
            None => (Vec::new(), None),
        }
    }

    // ---- inheritance ------------------------------------------------

    /// Splice an already-compiled parent inline and open a static
    /// extends region over it. Output is disallowed until
    /// [`end_extends`](Self::end_extends).
    pub fn begin_static_extends(&mut self, parent: Body) {
        let boundary = self.buffer.len();
        self.buffer.splice(parent);
        self.extends.push(ExtendsState::Static { boundary });
        self.buffer.push_allow_output(false);
    }

    /// Open a dynamic extends region; block overrides are collected for
    /// a runtime extend. The signature text becomes part of the cache
    /// fingerprint of this template.
    pub fn begin_dynamic_extends(&mut self, signature: &str) {
        self.extends.push(ExtendsState::Dynamic {
            overrides: Vec::new(),
        });
        self.buffer.push_allow_output(false);
        if self.extends_key.is_none() {
            self.extends_key = Some(signature.to_string());
        }
    }

    /// Close the innermost extends region. Returns the collected
    /// overrides when it was dynamic.
    pub fn end_extends(&mut self) -> Option<Vec<RegionOverride>> {
        self.buffer.pop_allow_output();
        match self.extends.pop() {
            Some(ExtendsState::Dynamic { overrides }) => Some(overrides),
            _ => None,
        }
    }

    /// Define or override a named block region, according to the
    /// innermost extends state.
    pub fn define_region(
        &mut self,
        name: &str,
        mode: OverrideMode,
        body: Body,
    ) -> Result<(), Error> {
        let Some(state) = self.extends.last_mut() else {
            let instr = Instr::Region {
                name: name.to_string(),
                body,
            };
            return self.emit(instr);
        };
        match state {
            ExtendsState::Dynamic { overrides } => {
                overrides.push(RegionOverride {
                    name: name.to_string(),
                    mode,
                    body,
                });
                Ok(())
            }
            ExtendsState::Static { boundary } => {
                let boundary = *boundary;
                if self.buffer.override_region(boundary, name, mode, body) {
                    Ok(())
                } else {
                    Err(self.error(format!("output not allowed in block `{name}`")))
                }
            }
        }
    }

    // ---- nested compiles --------------------------------------------

    /// Record a resource as touched by this compilation.
    pub fn note_dependency(&mut self, name: &str) {
        if !self.dependencies.iter().any(|d| d == name) {
            self.dependencies.push(name.to_string());
        }
    }

    /// Compile another resource into its own body, for static includes
    /// and extends parents. Errors are wrapped with the position of the
    /// referencing tag.
    pub fn subcompile_resource(&mut self, name: &str) -> Result<Body, Error> {
        if self.include_stack.iter().any(|n| n == name) {
            return Err(self.error(format!("circular inclusion of \"{name}\"")));
        }
        let source = match self.loader.get_resource(name) {
            Ok(source) => source,
            Err(SourceError::NotFound(n)) => return Err(Error::NotFound(n)),
            Err(e) => return Err(self.error(format!("failed to load \"{name}\": {e}"))),
        };
        self.note_dependency(name);

        let outer_resource = mem::replace(&mut self.resource, name.to_string());
        let outer_line = mem::replace(&mut self.line, 1);
        self.include_stack.push(name.to_string());

        let result = self.tokenize_source(&source).and_then(|tokens| {
            self.buffer.push_frame();
            let compiled = self.compile_tokens(&tokens);
            let body = self.buffer.pop_frame();
            compiled.map(|()| body)
        });

        self.include_stack.pop();
        self.resource = outer_resource;
        self.line = outer_line;

        result.map_err(|cause| {
            CompileError::wrap(
                self.resource.clone(),
                self.line,
                format!("in template \"{name}\""),
                cause,
            )
            .into()
        })
    }

    fn tokenize_source(&self, source: &str) -> Result<Vec<Token>, Error> {
        tag_tokenizer().tokenize(source).map_err(|e| {
            let line = 1 + source[..e.position.min(source.len())]
                .bytes()
                .filter(|&b| b == b'\n')
                .count() as u32;
            CompileError::wrap(
                self.resource.clone(),
                line,
                e.message.clone(),
                Error::Tokenize(e),
            )
            .into()
        })
    }

    // ---- the main loop ----------------------------------------------

    /// Compile a token run into the current frame: literal text is
    /// buffered, tags dispatch to a registered block or the expression
    /// compiler.
    pub fn compile_tokens(&mut self, tokens: &[Token]) -> Result<(), Error> {
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Text(text) => {
                    self.emit_literal(text)?;
                    self.bump_lines(text);
                    i += 1;
                }
                group @ Token::Group(_) => {
                    let mut raw = String::new();
                    group.flatten_into(&mut raw);

                    if group.open_delimiter() == Some("{*") {
                        self.bump_lines(&raw);
                        i += 1;
                        continue;
                    }

                    let interior = group
                        .interior()
                        .ok_or_else(|| self.error("malformed tag"))?;
                    let inner = interior.trim().to_string();
                    if inner.is_empty() {
                        return Err(self.error("empty tag"));
                    }
                    if let Some(rest) = inner.strip_prefix('/') {
                        return Err(
                            self.error(format!("unexpected closing tag `/{}`", rest.trim()))
                        );
                    }

                    let word = leading_word(&inner);
                    match self.context.get_block(word) {
                        Some(block) => {
                            let signature = inner[word.len()..].trim().to_string();
                            if !block.has_signature() && !signature.is_empty() {
                                return Err(self.error(format!(
                                    "block `{word}` does not take a signature"
                                )));
                            }
                            self.bump_lines(&raw);
                            if block.needs_close() {
                                let closer = self.extract_body(tokens, i + 1, word)?;
                                block.compile(self, &signature, Some(&tokens[i + 1..closer]))?;
                                let mut closer_raw = String::new();
                                tokens[closer].flatten_into(&mut closer_raw);
                                self.bump_lines(&closer_raw);
                                i = closer + 1;
                            } else {
                                block.compile(self, &signature, None)?;
                                i += 1;
                            }
                        }
                        None => {
                            let instr = self.compile_tag_expression(&inner)?;
                            self.emit(instr)?;
                            self.bump_lines(&raw);
                            i += 1;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Find the `{/name}` closing a block opened just before `from`,
    /// counting nested same-named openings.
    fn extract_body(&self, tokens: &[Token], from: usize, name: &str) -> Result<usize, Error> {
        let mut depth = 0usize;
        for (j, token) in tokens.iter().enumerate().skip(from) {
            if token.open_delimiter() != Some("{") {
                continue;
            }
            let Some(interior) = token.interior() else {
                continue;
            };
            let inner = interior.trim();
            if let Some(rest) = inner.strip_prefix('/') {
                if rest.trim() == name {
                    if depth == 0 {
                        return Ok(j);
                    }
                    depth -= 1;
                }
            } else if leading_word(inner) == name {
                depth += 1;
            }
        }
        Err(self.error(format!("unterminated block `{name}`")))
    }

    fn compile_tag_expression(&mut self, text: &str) -> Result<Instr, Error> {
        let (expr, statement) = self.compile_expression_or_statement(text)?;
        if statement {
            Ok(Instr::Eval(expr))
        } else {
            Ok(Instr::Print(self.inject_output_filters(expr)))
        }
    }

}

/// The leading identifier of a tag interior.
fn leading_word(text: &str) -> &str {
    let end = text
        .find(|c: char| !c.is_alphanumeric() && c != '_')
        .unwrap_or(text.len());
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_source::InMemoryLoader;

    fn compiler_with(loader: &InMemoryLoader) -> Compiler<'_> {
        Compiler::new(loader, TemplateContext::new())
    }

    #[test]
    fn plain_text_compiles_to_one_literal() {
        let loader = InMemoryLoader::new();
        let mut compiler = compiler_with(&loader);
        let tpl = compiler.compile("t", "hello world").unwrap();
        assert_eq!(tpl.body, vec![Instr::Literal("hello world".to_string())]);
        assert_eq!(tpl.dependencies, vec!["t".to_string()]);
    }

    #[test]
    fn comments_disappear_from_output() {
        let loader = InMemoryLoader::new();
        let mut compiler = compiler_with(&loader);
        let tpl = compiler.compile("t", "a{* hidden *}b").unwrap();
        assert_eq!(tpl.body, vec![Instr::Literal("ab".to_string())]);
    }

    #[test]
    fn unexpected_closing_tag_is_an_error() {
        let loader = InMemoryLoader::new();
        let mut compiler = compiler_with(&loader);
        let err = compiler.compile("t", "text {/if}").unwrap_err();
        assert!(err.to_string().contains("unexpected closing tag `/if`"));
    }

    #[test]
    fn error_reports_the_line_of_the_tag() {
        let loader = InMemoryLoader::new();
        let mut compiler = compiler_with(&loader);
        let err = compiler.compile("t", "one\ntwo\n{/if}").unwrap_err();
        assert!(err.to_string().contains("line 3"), "got: {err}");
    }

    #[test]
    fn compile_is_not_reentrant() {
        // The guard is observable through the flag because a block
        // calling back into compile() would see it set.
        let loader = InMemoryLoader::new();
        let mut compiler = compiler_with(&loader);
        compiler.compiling = true;
        let err = compiler.compile("t", "text").unwrap_err();
        assert!(err.to_string().contains("already in use"));
        compiler.compiling = false;
        assert!(compiler.compile("t", "text").is_ok());
    }

    #[test]
    fn subcompile_missing_resource_is_not_found() {
        let loader = InMemoryLoader::new();
        let mut compiler = compiler_with(&loader);
        compiler.resource = "outer".to_string();
        let err = compiler.subcompile_resource("missing.tpl").unwrap_err();
        assert!(err.to_string().contains("template not found"), "got: {err}");
    }

    #[test]
    fn subcompile_detects_circular_includes() {
        let loader = InMemoryLoader::new().with("a", "x");
        let mut compiler = compiler_with(&loader);
        compiler.include_stack = vec!["a".to_string()];
        let err = compiler.subcompile_resource("a").unwrap_err();
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn next_id_is_compiler_owned_and_monotonic() {
        let loader = InMemoryLoader::new();
        let mut compiler = compiler_with(&loader);
        assert_eq!(compiler.next_id(), 0);
        assert_eq!(compiler.next_id(), 1);
        let mut other = compiler_with(&loader);
        assert_eq!(other.next_id(), 0);
    }
}
