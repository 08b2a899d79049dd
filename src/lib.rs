//! The library code for `nbpost`, a small toolkit for a notebook-driven static
//! blog. It does three jobs:
//!
//! 1. Converting notebooks into posts ([`crate::convert`])
//! 2. Verifying that dated asset directories have posts ([`crate::verify`])
//! 3. Generating the regression data and figure series used by the
//!    variational-inference posts ([`crate::regression`], [`crate::figures`])
//!
//! Conversion is the most involved. The export tool ([`crate::export`])
//! writes `{stem}.md` and a `{stem}_files` bundle; the bundle replaces the
//! post's canonical asset directory ([`crate::assets`]), references to it
//! inside the markdown are rewritten ([`crate::links`]), dated posts get a
//! front-matter header ([`crate::frontmatter`]), and the result is written to
//! the posts directory under a name derived from the notebook
//! ([`crate::post`]).

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod assets;
pub mod config;
pub mod convert;
pub mod export;
pub mod figures;
pub mod frontmatter;
pub mod links;
pub mod post;
pub mod regression;
pub mod verify;
