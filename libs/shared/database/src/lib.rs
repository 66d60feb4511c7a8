pub mod error;
pub mod store;
pub mod supabase;

pub use error::StoreError;
pub use store::{Collection, Document, DocumentStore, Filter, MemoryCollection, SupabaseCollection};
pub use supabase::SupabaseClient;
