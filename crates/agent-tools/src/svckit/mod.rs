//! Service Kit - Agent Tools
//!
//! Implementations of `agent_core::Tool` for the built-in capabilities.

mod encode;
mod javascript;
mod jwt;
mod sql;
mod uuid_gen;

pub use encode::Base64Tool;
pub use javascript::{JavaScriptLimits, JavaScriptTool};
pub use jwt::{JwtDecodeTool, decode_claims};
pub use sql::{SqlConfig, SqlTool};
pub use uuid_gen::UuidTool;
