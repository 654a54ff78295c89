//! These models represent the objects handed back to an MCP client
//!
//! The wire format follows the MCP tool-result shape: a list of typed content
//! blocks plus an `isError` flag. Everything the reader produces is converted
//! into these structs before it leaves the library.
pub mod content;
pub mod tool;
