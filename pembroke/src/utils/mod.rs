//! Utilities for memory-efficient data structures.
//!
//! This module provides low-level utilities used internally by the reactor.
//! In particular, it exposes a generational [`Slab`] used as the native
//! timer handle table.

mod slab;

pub(crate) use slab::{Key, Slab};
