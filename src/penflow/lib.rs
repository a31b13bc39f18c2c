//! # Penflow Architecture
//!
//! Penflow is the **storage and state core of a Markdown note editor**. It
//! keeps every note in an observable in-memory library, mirrors that library
//! to a local JSON document, and tracks the note open in the editor. There is
//! no UI here: text widgets, rendering and dialogs belong to the host, which
//! plugs in through small traits ([`library::Confirm`], [`editor::Exporter`])
//! and change subscriptions.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Builds the stack from config, owns library + editor      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  State Layer (library.rs, editor.rs)                        │
//! │  - Observable files, sort config, loading flag              │
//! │  - Queries: sort, search, tag filter                        │
//! │  - Editor buffer, mode, dirty flag, save/export             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - LibraryAdapter: typed CRUD, change listeners, auto-save  │
//! │  - Table (in memory) + Persister (FsPersister, MemPersister)│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## One Direction of Data
//!
//! State only ever flows up from storage. A mutation goes down through the
//! adapter, the adapter notifies its listeners with a complete snapshot, and
//! the library replaces its `files` wholesale. Nothing above the adapter
//! patches its copy of the data, so the view can never drift from the table.
//!
//! ## Single-Threaded
//!
//! Everything uses `Rc`/`RefCell` and runs on the caller's thread. Listener
//! callbacks run synchronously inside the mutating call. Durable writes are
//! the only thing deferred, and only by the auto-save interval.
//!
//! ## Testing Strategy
//!
//! 1. **Storage** (`store/*.rs`): adapter semantics against `MemPersister`,
//!    which can inject corrupt documents and simulate storage failures.
//! 2. **State** (`library.rs`, `editor.rs`): queries and lifecycles against
//!    an in-memory adapter.
//! 3. **End to end** (`tests/`): the file-backed stack across restarts.
//!
//! ## Module Overview
//!
//! - [`api`]: Composition root and facade
//! - [`library`]: Library state container and queries
//! - [`editor`]: Editor state and operations
//! - [`store`]: Table, persisters and the library adapter
//! - [`model`]: Records, partial updates, validation, frontmatter, sort settings
//! - [`tags`]: Comma-separated tag handling and tag extraction
//! - [`observe`]: Subscriber registry and observable values
//! - [`config`]: Configuration management
//! - [`error`]: Error types
//!
//! Logging goes through the `log` facade; the host installs the logger.

pub mod api;
pub mod config;
pub mod editor;
pub mod error;
pub mod library;
pub mod model;
pub mod observe;
pub mod store;
pub mod tags;
