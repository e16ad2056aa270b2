pub mod session;

pub use session::{TestSession, init_tracing};
