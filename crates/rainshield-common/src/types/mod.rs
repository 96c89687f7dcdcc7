//! Core identifier types for the Rainshield engine

pub mod identifiers;
