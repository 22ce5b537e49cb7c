//! Host tokenizer for the scripting language.
//!
//! The macro layer treats this tokenizer as a collaborator: it asks it for tokens and
//! feeds it characters. Nothing here knows about macros beyond the two definition
//! keywords being reserved words.

pub mod lexer;
pub mod token;

pub use lexer::{tokenize_plain, CharFeed, Lexer, StrFeed};
pub use token::Token;
