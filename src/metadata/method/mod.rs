//! Method bodies and the tokens referenced by their instructions.
//!
//! [`MethodBody`] parses the tiny and fat header formats of ECMA-335 II.25.4 together with
//! the exception handling sections. [`scan_operand_tokens`] walks the instruction stream with
//! the operand size table of Partition III and yields every type, method and field token an
//! instruction carries, which is all the usage crawler needs from IL; instructions are not
//! decoded any further.

mod body;
mod operands;

pub use body::{ExceptionClause, ExceptionClauseFlags, MethodBody, MethodBodyFlags, SectionFlags};
pub use operands::{scan_operand_tokens, OperandKind, OperandToken};
