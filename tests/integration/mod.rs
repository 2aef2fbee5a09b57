//! Integration tests for the odmrfit-rs library
//!
//! These tests fit whole datasets through the public driver, rather than
//! exercising individual components.


// Noisy synthetic imaging datasets
pub mod synthetic_fits;
