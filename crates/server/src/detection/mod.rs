//! Sigma-style detection over batched logs.

pub mod sigma;
pub mod worker;
