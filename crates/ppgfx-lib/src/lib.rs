pub mod decomposition;
pub mod error;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod preprocess;
pub mod segment;
pub mod signal;
pub mod table;

pub use decomposition::*;
pub use error::*;
pub use metrics::*;
pub use pipeline::*;
pub use preprocess::*;
pub use segment::*;
pub use signal::*;
pub use table::*;
