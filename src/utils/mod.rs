//! Utility functions and helpers for the odmrfit-rs library.

pub mod finite_difference;
