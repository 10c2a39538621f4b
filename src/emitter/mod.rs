//! TypeScript emission: syntax tree, artifact builders, registry parsing.

pub mod artifacts;
pub mod ident;
pub mod registry;
pub mod ts;
