pub mod entities;
pub mod errors;
pub mod store;
pub mod tally;

pub use entities::*;
pub use errors::*;
pub use store::*;
pub use tally::*;
