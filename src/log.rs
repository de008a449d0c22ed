//! Logging macros.
//!
//! With the `defmt` feature the crate logs through `defmt`. Without it the
//! macros only borrow their arguments so that call sites compile the same
//! way in both configurations and produce no code.

#![allow(unused_macros, unused_imports)]

#[cfg(feature = "defmt")]
pub(crate) use defmt::{debug, error, info, trace, warn};

#[cfg(not(feature = "defmt"))]
macro_rules! trace {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        let _ = ($fmt $(, &$arg)*);
    }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        let _ = ($fmt $(, &$arg)*);
    }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        let _ = ($fmt $(, &$arg)*);
    }};
}

// `warn` is a built-in lint attribute, so the macro is renamed on export.
#[cfg(not(feature = "defmt"))]
macro_rules! warni {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        let _ = ($fmt $(, &$arg)*);
    }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! error {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        let _ = ($fmt $(, &$arg)*);
    }};
}

#[cfg(not(feature = "defmt"))]
pub(crate) use {debug, error, info, trace, warni as warn};
