pub mod compression;
pub mod progress;
pub mod retention;
pub mod rewriter;
pub mod writer;
