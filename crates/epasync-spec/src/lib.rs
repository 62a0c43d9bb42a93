//! AsyncAPI document model.
//!
//! Builds an immutable [`AsyncApiDocument`] from an AsyncAPI 2.x or 3.x tree:
//! channels in declaration order, every message flattened into one map under
//! a canonical key, and each message payload classified as JSON Schema, Avro
//! or unsupported exactly once at build time.

pub mod builder;
pub mod error;
pub mod message;
pub mod model;
pub mod refs;
pub mod schema_format;
pub mod service;
pub mod violation;

pub use builder::build_document;
pub use error::{AsyncApiError, ErrorKind};
pub use message::{Carrier, EpMessageInfo, MessageDocument};
pub use model::{
    AsyncApiDocument, BrokerType, Channel, ChannelOperation, Direction, EpDocumentInfo, Info,
    DEFAULT_CHANNEL_DELIMITER,
};
pub use schema_format::{
    classify, classify_content_type, classify_media_type, ClassifierInput, SchemaFormatType,
};
pub use service::{load_document, DocumentService, SpecSource};
pub use violation::{Level, Violation, Violations};
