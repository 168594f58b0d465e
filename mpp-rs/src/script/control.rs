//! Conditional block state machine.
//!
//! One [`ControlFrame`] per open `#IF` or `#SWITCH`.  A line is active when
//! every frame on the stack has `state == true`; the empty stack is the
//! always-active root.
//!
//! Frames opened while an enclosing frame is inactive start out as
//! `taken = true, state = false`.  Their conditions are never evaluated and no
//! later branch of theirs can become active.

use super::error::DirectiveError;
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    If,
    Switch,
}

impl FrameKind {
    pub fn keyword(self) -> &'static str {
        match self {
            FrameKind::If => "#IF",
            FrameKind::Switch => "#SWITCH",
        }
    }
}

/// Which branch of its block a frame is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    If,
    ElseIf,
    Else,
    Switch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlFrame {
    pub kind: FrameKind,
    pub branch: Branch,
    /// Lines in the current branch are emitted.
    pub state: bool,
    /// Some branch (or CASE/DEFAULT) of this block already fired.
    pub taken: bool,
    pub discriminant: Value,
    /// 1-based line of the opening directive.
    pub opened_at: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ControlStack {
    frames: Vec<ControlFrame>,
}

impl ControlStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn top(&self) -> Option<&ControlFrame> {
        self.frames.last()
    }

    /// Every frame is in an active branch.
    pub fn is_active(&self) -> bool {
        self.frames.iter().all(|f| f.state)
    }

    fn push(&mut self, kind: FrameKind, branch: Branch, line: usize) -> &mut ControlFrame {
        let live = self.is_active();
        self.frames.push(ControlFrame {
            kind,
            branch,
            state: false,
            taken: !live,
            discriminant: Value::default(),
            opened_at: line,
        });
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn top_if(&mut self, directive: &'static str) -> Result<&mut ControlFrame, DirectiveError> {
        match self.frames.last_mut() {
            Some(f) if f.kind == FrameKind::If && matches!(f.branch, Branch::If | Branch::ElseIf) => Ok(f),
            _ => Err(DirectiveError::Unmatched {
                directive,
                opener: "#IF",
            }),
        }
    }

    fn top_switch(&mut self, directive: &'static str) -> Result<&mut ControlFrame, DirectiveError> {
        match self.frames.last_mut() {
            Some(f) if f.kind == FrameKind::Switch => Ok(f),
            _ => Err(DirectiveError::Unmatched {
                directive,
                opener: "#SWITCH",
            }),
        }
    }

    /// `#IF`.  `cond` runs only when the enclosing region is active.  The
    /// frame is pushed even when `cond` fails; the branch is then false.
    pub fn push_if<F>(&mut self, line: usize, cond: F) -> Result<(), DirectiveError>
    where
        F: FnOnce() -> Result<bool, DirectiveError>,
    {
        let frame = self.push(FrameKind::If, Branch::If, line);
        if frame.taken {
            return Ok(());
        }
        let result = cond();
        frame.state = matches!(result, Ok(true));
        frame.taken = frame.state;
        result.map(|_| ())
    }

    /// `#ELSEIF`.  `cond` runs only when no earlier branch fired.
    pub fn else_if<F>(&mut self, cond: F) -> Result<(), DirectiveError>
    where
        F: FnOnce() -> Result<bool, DirectiveError>,
    {
        let frame = self.top_if("#ELSEIF")?;
        frame.branch = Branch::ElseIf;
        if frame.taken {
            frame.state = false;
            return Ok(());
        }
        let result = cond();
        frame.state = matches!(result, Ok(true));
        frame.taken = frame.state;
        result.map(|_| ())
    }

    /// `#ELSE`.
    pub fn else_(&mut self) -> Result<(), DirectiveError> {
        let frame = self.top_if("#ELSE")?;
        frame.branch = Branch::Else;
        frame.state = !frame.taken;
        frame.taken = true;
        Ok(())
    }

    /// `#ENDIF` closes the innermost frame, whatever its kind.
    pub fn end_if(&mut self) -> Result<ControlFrame, DirectiveError> {
        self.frames.pop().ok_or(DirectiveError::Unmatched {
            directive: "#ENDIF",
            opener: "#IF",
        })
    }

    /// `#SWITCH`.  `discriminant` runs only when the enclosing region is
    /// active; on failure the frame still opens with an empty discriminant.
    pub fn switch<F>(&mut self, line: usize, discriminant: F) -> Result<(), DirectiveError>
    where
        F: FnOnce() -> Result<Value, DirectiveError>,
    {
        let frame = self.push(FrameKind::Switch, Branch::Switch, line);
        if frame.taken {
            return Ok(());
        }
        frame.discriminant = discriminant()?;
        Ok(())
    }

    /// `#CASE v1 v2 …`.  Fires on the first CASE whose list holds a value
    /// loosely equal to the discriminant.
    pub fn case(&mut self, values: &[Value]) -> Result<(), DirectiveError> {
        let frame = self.top_switch("#CASE")?;
        frame.state = !frame.taken && values.iter().any(|v| frame.discriminant.loose_eq(v));
        frame.taken |= frame.state;
        Ok(())
    }

    /// `#DEFAULT` fires when nothing before it did.
    pub fn default_case(&mut self) -> Result<(), DirectiveError> {
        let frame = self.top_switch("#DEFAULT")?;
        frame.state = !frame.taken;
        frame.taken = true;
        Ok(())
    }

    pub fn end_switch(&mut self) -> Result<ControlFrame, DirectiveError> {
        self.top_switch("#ENDSWITCH")?;
        self.frames.pop().ok_or(DirectiveError::Unmatched {
            directive: "#ENDSWITCH",
            opener: "#SWITCH",
        })
    }

    /// One `Unclosed` error per frame still open, outermost first.
    pub fn unclosed(&self) -> impl Iterator<Item = DirectiveError> + '_ {
        self.frames.iter().map(|f| DirectiveError::Unclosed {
            directive: f.kind.keyword(),
            line: f.opened_at,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
