//! Cross-module tests: harmonic model properties and the prediction service.

mod harmonic_tests;
