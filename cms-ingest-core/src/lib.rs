#![doc = "cms-ingest-core: core logic library for cms-ingest."]

//! This crate holds the ingestion pipeline for CMS provider datasets: the category
//! catalog, the collaborator contracts, their HTTP/S3/SES implementations and the
//! orchestrator that ties them together.
//!
//! # Usage
//! Build a [`catalog::Catalog`] and [`config::Settings`], construct the collaborators
//! once per process, then drive a run through [`ingest::Orchestrator`].

pub mod catalog;
pub mod config;
pub mod contract;
pub mod fetch;
pub mod ingest;
pub mod notify;
pub mod publish;
pub mod result;
