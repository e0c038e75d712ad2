//! # Evidence Engine
//!
//! A multi-index retrieval, routing, and fusion engine for question
//! answering over mixed evidence: plain documents, PDFs, source code,
//! and CSV-backed relational tables.
//!
//! Each question is classified by a language-model router, evidence is
//! gathered from the chosen index(es) — dense vector search over chunked
//! text, or SQL synthesized against the relational store — and a final
//! grounded answer is synthesized with bracketed citations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │   Readers    │──▶│   Pipeline   │──▶│ DenseStore  │
//! │ doc/pdf/code │   │ Chunk+Embed  │   │ (in-memory) │
//! └──────────────┘   └──────────────┘   └──────┬──────┘
//! ┌──────────────┐   ┌──────────────┐          │
//! │  CSV tables  │──▶│    SQLite    │──────┐   │
//! └──────────────┘   └──────────────┘      ▼   ▼
//!                    ┌──────────┐      ┌─────────────┐
//!                    │  Router  │─────▶│ Orchestrator│
//!                    └──────────┘      └──────┬──────┘
//!                                   ┌─────────┴────────┐
//!                                   ▼                  ▼
//!                             ┌──────────┐       ┌──────────┐
//!                             │   CLI    │       │   HTTP   │
//!                             │  (evq)   │       │  (/ask)  │
//!                             └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! evq serve                     # build indexes, start HTTP server
//! evq ask "How did revenue change?"
//! evq tables                    # show loaded relational schema
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunk`] | Sliding-window text chunking |
//! | [`readers`] | Per-kind text extraction (doc, pdf, code) |
//! | [`store`] | Exact dense vector store |
//! | [`index`] | Indexing pipeline and query entry |
//! | [`fusion`] | Reciprocal rank fusion |
//! | [`embedding`] | Embedding capability |
//! | [`llm`] | Language-model capability |
//! | [`router`] | Question routing |
//! | [`sql`] | CSV-backed relational store and text-to-SQL |
//! | [`answer`] | Per-question orchestration |
//! | [`server`] | HTTP surface |
//! | [`error`] | Typed error kinds |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod index;
pub mod llm;
pub mod models;
pub mod readers;
pub mod router;
pub mod server;
pub mod sql;
pub mod store;
