pub mod health;
pub mod logs;
pub mod parse;
pub mod replay;
pub mod sessions;
