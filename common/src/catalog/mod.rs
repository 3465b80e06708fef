pub mod index;
pub mod render;
pub mod schema;
pub mod shared;

pub use index::{ColumnIndex, ColumnMatch};
pub use render::render_schema;
pub use schema::{ColumnDescriptor, SchemaCatalog};
pub use shared::SharedCatalog;
