pub mod chain;
pub mod router;
pub mod store;

pub use chain::{Chain, ChainError, SimulatedChain};
pub use router::{BuiltTx, Quote, Router, RouterError, SimulatedRouter};
pub use store::{OrderStore, PgOrderStore};
