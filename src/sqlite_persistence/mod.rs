mod database;
mod versioned_schema;

pub use database::open_versioned_database;
#[cfg(test)]
pub use database::open_in_memory_database;
pub use versioned_schema::*;
