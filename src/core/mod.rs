// Core modules implementing records, pagination state, and error modeling.
pub mod error;
pub mod fetch;
pub mod record;
pub mod store;
