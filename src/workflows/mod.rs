pub mod batch;
pub mod downloads;
pub mod library;
pub mod status;
