//! Preparation of raw run tokens: classification into model, map and
//! parameter arguments, and normalization of legacy RNA residue codes.

pub mod classify;
pub mod normalize;
