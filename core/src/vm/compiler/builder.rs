use crate::val::Function;
use crate::vm::Instr;

/// Accumulates one function body and patches forward jumps.
#[derive(Default)]
pub(crate) struct FunctionBuilder {
    code: Vec<Instr>,
}

impl FunctionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, instr: Instr) -> usize {
        self.code.push(instr);
        self.code.len() - 1
    }

    #[inline]
    pub fn here(&self) -> usize {
        self.code.len()
    }

    /// Conditional branch with its offset left for `patch_to_here`.
    pub fn emit_branch(&mut self, when: bool) -> usize {
        self.emit(Instr::Branch { when, offset: 0 })
    }

    pub fn emit_jump(&mut self) -> usize {
        self.emit(Instr::Jump(0))
    }

    /// Point the jump or branch at `at` to the next instruction emitted.
    pub fn patch_to_here(&mut self, at: usize) {
        let target = self.here() as isize - at as isize;
        match &mut self.code[at] {
            Instr::Branch { offset, .. } => *offset = target,
            Instr::Jump(offset) => *offset = target,
            other => unreachable!("patching non-jump instruction `{}`", other),
        }
    }

    pub fn finish(self, name: &str, required: usize, variadic: bool) -> Function {
        Function::script(name, required, variadic, self.code)
    }
}
