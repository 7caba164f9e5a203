// Formula parsing and restricted evaluation

pub mod eval;
pub mod parser;
pub mod refs;

pub use eval::{eval_expr, evaluate};
pub use parser::{parse, Expr, Op};
pub use refs::{col_to_letters, has_cell_reference, letters_to_col, CellAddr, NoValues, ValueLookup};
