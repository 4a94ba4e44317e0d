pub mod book;
pub mod id;
pub mod manager;
pub mod metadata;

pub use book::{Book, CLOSED, OpenSlot};
pub use id::allocate_id;
pub use manager::{BOOKS_DIR, BookManager, default_identity};
pub use metadata::{METADATA_FILE, Metadata, MetadataPatch, MetadataStore, Progress, Status};
