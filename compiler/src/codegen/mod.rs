//! Source generation backends. Currently Python only; the [source]
//! buffer and the [crate::ir::Tool] input are backend-neutral.

pub mod python;
mod source;

#[cfg(test)]
mod tests;
