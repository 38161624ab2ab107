use smallvec::SmallVec;

use weft_core::ir::{self, Body, Instr, OverrideMode};

/// Raised when an instruction would print inside a region that disallows
/// output (between an `extends` tag and its end tag, outside any block).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct OutputDisallowed;

/// Buffer for emitting compiled instructions.
///
/// The buffer is a stack of in-progress frames: blocks push a frame,
/// compile their body into it and pop it back as a finished instruction
/// sequence. The inheritance override logic operates on the instructions
/// of the current frame, bounded to the region after the innermost
/// unresolved extends splice.
pub struct OutputBuffer {
    frames: SmallVec<[Body; 4]>,
    allow_output: SmallVec<[bool; 4]>,
}

impl OutputBuffer {
    /// Create a buffer with a single root frame, output allowed.
    pub fn new() -> Self {
        let mut frames = SmallVec::new();
        frames.push(Body::new());
        let mut allow_output = SmallVec::new();
        allow_output.push(true);
        Self {
            frames,
            allow_output,
        }
    }

    /// Number of instructions in the current frame.
    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    fn current(&self) -> &Body {
        self.frames.last().expect("buffer always has a root frame")
    }

    fn current_mut(&mut self) -> &mut Body {
        self.frames
            .last_mut()
            .expect("buffer always has a root frame")
    }

    /// Start a new frame; subsequent pushes go to it.
    pub fn push_frame(&mut self) {
        self.frames.push(Body::new());
    }

    /// Finish the top frame and return its instructions.
    pub fn pop_frame(&mut self) -> Body {
        if self.frames.len() > 1 {
            self.frames.pop().unwrap_or_default()
        } else {
            std::mem::take(self.current_mut())
        }
    }

    /// Whether printed output is currently legal.
    pub fn output_allowed(&self) -> bool {
        *self.allow_output.last().unwrap_or(&true)
    }

    pub fn push_allow_output(&mut self, allow: bool) {
        self.allow_output.push(allow);
    }

    pub fn pop_allow_output(&mut self) {
        if self.allow_output.len() > 1 {
            self.allow_output.pop();
        }
    }

    /// Append literal text, merging with a trailing literal instruction.
    ///
    /// Whitespace-only text is tolerated (and dropped) where output is
    /// disallowed, so the formatting between an extends tag and its
    /// blocks does not error.
    pub fn push_literal(&mut self, text: &str) -> Result<(), OutputDisallowed> {
        if text.is_empty() {
            return Ok(());
        }
        if !self.output_allowed() {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(OutputDisallowed);
        }
        if let Some(Instr::Literal(prev)) = self.current_mut().last_mut() {
            prev.push_str(text);
        } else {
            self.current_mut().push(Instr::Literal(text.to_string()));
        }
        Ok(())
    }

    /// Append an instruction, rejecting output-producing instructions
    /// where output is disallowed.
    pub fn push(&mut self, instr: Instr) -> Result<(), OutputDisallowed> {
        if !self.output_allowed() && produces_output(&instr) {
            return Err(OutputDisallowed);
        }
        self.current_mut().push(instr);
        Ok(())
    }

    /// Splice an already-compiled body into the current frame, bypassing
    /// the output check. Used for inheritance and static includes, whose
    /// content was compiled under its own rules.
    pub fn splice(&mut self, body: Body) {
        self.current_mut().extend(body);
    }

    /// Resolve a block override against the current frame, searching for
    /// an ancestor region from `boundary` onward. Returns false when no
    /// region with that name exists in the searched span.
    pub fn override_region(
        &mut self,
        boundary: usize,
        name: &str,
        mode: OverrideMode,
        body: Body,
    ) -> bool {
        ir::apply_override(self.current_mut(), boundary, name, mode, body)
    }

    /// Consume the buffer, returning the root frame.
    pub fn finish(mut self) -> Body {
        self.frames.truncate(1);
        self.frames.pop().unwrap_or_default()
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether an instruction emits rendered output directly.
fn produces_output(instr: &Instr) -> bool {
    matches!(
        instr,
        Instr::Literal(_)
            | Instr::Print(_)
            | Instr::If { .. }
            | Instr::Foreach { .. }
            | Instr::Region { .. }
            | Instr::Include { .. }
            | Instr::With { .. }
            | Instr::Extend { .. }
            | Instr::FilterRegion { .. }
            | Instr::Cycle { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::ir::Expr;
    use weft_core::value::Value;

    #[test]
    fn adjacent_literals_merge() {
        let mut buf = OutputBuffer::new();
        buf.push_literal("a").unwrap();
        buf.push_literal("b").unwrap();
        let body = buf.finish();
        assert_eq!(body, vec![Instr::Literal("ab".to_string())]);
    }

    #[test]
    fn frames_isolate_instructions() {
        let mut buf = OutputBuffer::new();
        buf.push_literal("outer").unwrap();
        buf.push_frame();
        buf.push_literal("inner").unwrap();
        let inner = buf.pop_frame();
        assert_eq!(inner, vec![Instr::Literal("inner".to_string())]);
        assert_eq!(buf.finish(), vec![Instr::Literal("outer".to_string())]);
    }

    #[test]
    fn disallowed_output_rejects_text() {
        let mut buf = OutputBuffer::new();
        buf.push_allow_output(false);
        assert_eq!(buf.push_literal("  \n  "), Ok(()));
        assert_eq!(buf.push_literal("text"), Err(OutputDisallowed));
        assert_eq!(
            buf.push(Instr::Print(Expr::Literal(Value::Null))),
            Err(OutputDisallowed)
        );
        // non-printing instructions are fine
        assert_eq!(buf.push(Instr::Break), Ok(()));
        buf.pop_allow_output();
        assert_eq!(buf.push_literal("text"), Ok(()));
    }

    #[test]
    fn override_searches_from_boundary() {
        let mut buf = OutputBuffer::new();
        buf.push(Instr::Region {
            name: "t".to_string(),
            body: vec![Instr::Literal("sibling".to_string())],
        })
        .unwrap();
        let boundary = buf.len();
        buf.push(Instr::Region {
            name: "t".to_string(),
            body: vec![Instr::Literal("ancestor".to_string())],
        })
        .unwrap();
        let found = buf.override_region(
            boundary,
            "t",
            OverrideMode::Replace,
            vec![Instr::Literal("new".to_string())],
        );
        assert!(found);
        let body = buf.finish();
        let Instr::Region { body: first, .. } = &body[0] else {
            panic!("expected region");
        };
        assert_eq!(first, &vec![Instr::Literal("sibling".to_string())]);
    }

    #[test]
    fn missing_override_target_reports_false() {
        let mut buf = OutputBuffer::new();
        assert!(!buf.override_region(0, "t", OverrideMode::Replace, Vec::new()));
    }
}
