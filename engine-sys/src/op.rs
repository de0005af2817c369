use engine_dtype::Dtype;

/// How an engine reports identifiers from [`Engine::call`](crate::Engine::call).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallConvention {
    /// Legacy convention: the engine may relocate or consume operand storage.
    /// A call returns one identifier per operand, in operand order, then the
    /// result identifiers. Previous operand identifiers are dead afterwards
    /// unless returned unchanged.
    Rebinding,
    /// Operands are left untouched; a call returns result identifiers only.
    NonMutating,
}

impl CallConvention {
    /// Identifiers a well-behaved engine returns for `op`.
    pub fn expected_identifiers(self, op: &OpCode) -> usize {
        match self {
            CallConvention::Rebinding => op.operand_count() + op.result_count(),
            CallConvention::NonMutating => op.result_count(),
        }
    }
}

/// Operation catalog of the boundary.
///
/// Index arguments are zero-based; `first..=last` ranges are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum OpCode {
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    // comparison, result b8
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    // bitwise
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft(u32),
    ShiftRight(u32),
    Not,
    // layout
    Transpose { conjugate: bool },
    Col(u64),
    Cols { first: u64, last: u64 },
    Row(u64),
    Rows { first: u64, last: u64 },
    Join { dim: u32 },
    MatMul,
    Cast(Dtype),
    // normalization
    ZNorm { epsilon: f64 },
    ZNormInPlace { epsilon: f64 },
    MeanStdev,
}

impl OpCode {
    pub fn operand_count(&self) -> usize {
        match self {
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Rem
            | OpCode::Pow
            | OpCode::Eq
            | OpCode::Ne
            | OpCode::Lt
            | OpCode::Gt
            | OpCode::Le
            | OpCode::Ge
            | OpCode::BitAnd
            | OpCode::BitOr
            | OpCode::BitXor
            | OpCode::Join { .. }
            | OpCode::MatMul => 2,
            OpCode::ShiftLeft(_)
            | OpCode::ShiftRight(_)
            | OpCode::Not
            | OpCode::Transpose { .. }
            | OpCode::Col(_)
            | OpCode::Cols { .. }
            | OpCode::Row(_)
            | OpCode::Rows { .. }
            | OpCode::Cast(_)
            | OpCode::ZNorm { .. }
            | OpCode::ZNormInPlace { .. }
            | OpCode::MeanStdev => 1,
        }
    }

    pub fn result_count(&self) -> usize {
        match self {
            OpCode::ZNormInPlace { .. } => 0,
            OpCode::MeanStdev => 2,
            _ => 1,
        }
    }

    /// Whether the operation writes into its operand's storage.
    pub fn writes_operand(&self) -> bool {
        matches!(self, OpCode::ZNormInPlace { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Mul => "mul",
            OpCode::Div => "div",
            OpCode::Rem => "rem",
            OpCode::Pow => "pow",
            OpCode::Eq => "eq",
            OpCode::Ne => "ne",
            OpCode::Lt => "lt",
            OpCode::Gt => "gt",
            OpCode::Le => "le",
            OpCode::Ge => "ge",
            OpCode::BitAnd => "bit_and",
            OpCode::BitOr => "bit_or",
            OpCode::BitXor => "bit_xor",
            OpCode::ShiftLeft(_) => "shift_left",
            OpCode::ShiftRight(_) => "shift_right",
            OpCode::Not => "not",
            OpCode::Transpose { .. } => "transpose",
            OpCode::Col(_) => "col",
            OpCode::Cols { .. } => "cols",
            OpCode::Row(_) => "row",
            OpCode::Rows { .. } => "rows",
            OpCode::Join { .. } => "join",
            OpCode::MatMul => "matmul",
            OpCode::Cast(_) => "cast",
            OpCode::ZNorm { .. } => "znorm",
            OpCode::ZNormInPlace { .. } => "znorm_in_place",
            OpCode::MeanStdev => "mean_stdev",
        }
    }
}
