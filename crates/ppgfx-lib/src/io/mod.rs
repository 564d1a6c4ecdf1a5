pub mod csv;
pub mod export;
pub mod text;
