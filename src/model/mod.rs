pub mod board;
pub mod issue;
