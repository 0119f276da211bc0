//! mulmo-bundle - narrated media bundle pipeline
//!
//! Turns a source video or an extracted beat list into a localized,
//! multi-language viewer bundle (`mulmo_view.json` plus media) and ships it
//! to remote storage through presigned URLs.
//!
//! Stages, leaves first: [`segment`] plans silence-aware cuts, [`pipeline`]
//! derives per-segment clips and transcripts, [`localize`] translates and
//! narrates each beat, [`bundle`] assembles the manifest, [`upload`] publishes
//! it. Every generated file is cached by name, so an interrupted run resumes
//! where it stopped.

pub mod bundle;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod localize;
pub mod media;
pub mod pipeline;
pub mod retry;
pub mod segment;
pub mod speech;
pub mod transcribe;
pub mod translate;
pub mod upload;
pub mod workflow;
