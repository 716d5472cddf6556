//! Kumihimo core library.
//!
//! Kumihimo reads Meson build definitions without building anything. The
//! [`parser`] turns `meson.build` files into an [`ast`], the [`interpreter`]
//! evaluates them into a [`model::BuildDescription`], [`introspect`] writes
//! and reads the JSON documents describing a configured project, and
//! [`format`] re-emits build files in a canonical style. The [`cli`] and
//! [`runner`] modules tie these together behind the `kumihimo` binary.

pub mod ast;
pub mod cli;
pub mod diagnostics;
pub mod format;
pub mod hasher;
pub mod ini;
pub mod interpreter;
pub mod introspect;
pub mod literal;
pub mod machine_file;
pub mod model;
pub mod options;
pub mod parser;
pub mod runner;
pub mod version;
pub mod wrap;
