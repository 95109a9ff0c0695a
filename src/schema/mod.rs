//! Wire-format specification compiler
//!
//! Specifications are written in a small C-struct dialect:
//!
//! ```text
//! struct PacketHeader
//! {
//!     uint16    m_packetFormat;     // 2021
//!     uint8     m_packetId;
//! };
//!
//! union Packet {
//!     struct { uint8 m_a; uint32 m_b; } m_wideView;
//!     uint16 m_raw;
//! };
//! ```
//!
//! Compilation runs in three stages:
//! - [`lexer`] strips comments and quoted literals, then splits the text into tokens
//! - [`parser`] builds an arena [`Ast`] with a stack machine over open scopes
//! - the compiler lowers each declaration into a [`Layout`](crate::types::Layout),
//!   normalizing field names (`m_sector1TimeInMS` -> `sector1_time_in_ms`)
//!
//! The result is a sealed [`LayoutRegistry`]:
//!
//! ```rust
//! use boxbox::schema::LayoutRegistry;
//!
//! let registry = LayoutRegistry::compile("struct S { uint8 a; uint16 b[2]; };").unwrap();
//! assert_eq!(registry.get("S").unwrap().size, 5);
//! ```

pub mod ast;
mod compiler;
pub mod lexer;
pub mod naming;
pub mod parser;
mod registry;

pub use ast::{Ast, Node, NodeId, NodeKind, TypeRef};
pub use parser::parse;
pub use registry::{F1_2021_SPEC, LayoutRegistry};
