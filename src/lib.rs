//! Vocabulary Publishing Core
//!
//! Versioned, append-only publishing of SKOS vocabularies: concept schemes,
//! concepts, ontology properties and classes are edited freely and published
//! as immutable, checksummed snapshots.
//!
//! ## Features
//!
//! - **Consistent Snapshots**: A project is read through one transaction and
//!   resolved into a self-contained [`VocabularySnapshot`]
//! - **Validation**: Every publishability violation is collected, not just the first
//! - **Diffing**: Field-level, identity-keyed differences against the last published version
//! - **Version Ordering**: Releases and `-preN` pre-releases in one total order,
//!   mirrored by a store-side sort key
//! - **Audit Trail**: Append-only change events written with the mutation they document
//!
//! ## Architecture
//!
//! ```text
//! catalog ──► store ◄── publish
//!    │          ▲          │
//!    ▼          │          ├─► snapshot ─► validate
//! history ──────┘          ├─► diff
//!                          └─► version
//! ```

pub mod catalog;
pub mod checksum;
pub mod config;
pub mod diff;
pub mod error;
pub mod history;
pub mod publish;
pub mod snapshot;
pub mod store;
pub mod validate;
pub mod version;

pub use catalog::{import_document, ImportSummary, ProjectDocument};
pub use checksum::Checksum;
pub use config::PublishConfig;
pub use diff::{diff, DiffResult, FieldChange};
pub use error::{ErrorKind, PublishError, Result, StoreError};
pub use history::{ChangeAction, ChangeEvent, ChangeEventView, ChangeTracker, HistoryScope};
pub use publish::{PublishPreview, PublishRequest, PublishedVersion, PublishedVersionView, Publisher};
pub use snapshot::{build_snapshot, VocabularySnapshot};
pub use store::{MemoryStore, Store, Transaction};
pub use validate::{validate, ValidationCode, ValidationResult};
pub use version::Version;
