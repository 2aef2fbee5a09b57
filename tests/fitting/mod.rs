//! Tests for seeding and the fit driver

// Tests for the InitialGuessEngine
mod guess_tests;

// Tests for the Fit state machine
mod lifecycle_tests;
