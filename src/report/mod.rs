pub mod compiler;
pub mod renderer;
pub mod slug;

pub use compiler::{CompiledReport, ReportCompiler};
