//! # Chainload Engine
//!
//! Programmable HTTP load generation. A run repeatedly executes an ordered
//! workflow of API calls, carrying values extracted from one response into the
//! templates of the next, under a fixed-size pool of concurrent workers.
//!
//! ## Components
//!
//! - **Feeder** ([`feeder`]): hands one test-data record to each iteration
//! - **Executor** ([`executor`]): runs the workflow steps of one iteration
//! - **Scheduler** ([`scheduler`]): ticket producer, worker pool and result collection
//! - **Statistics** ([`stats`]): counts, histograms, latency percentiles
//! - **Transport** ([`transport`]): the HTTP seam, `reqwest` in production
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chainload_engine::Runner;
//!
//! let stats = Runner::new(config)?.run().await;
//! println!("{stats}");
//! ```

pub mod executor;
pub mod feeder;
pub mod scheduler;
pub mod stats;
pub mod transport;

pub use executor::{Outcome, StepResult, WorkflowExecutor};
pub use feeder::TestDataFeeder;
pub use scheduler::{EngineError, ProducerReport, Runner, Ticket};
pub use stats::{Percentile, RunStats, StatsAggregator, PERCENTILES};
pub use transport::{HttpTransport, PreparedRequest, RawResponse, Transport, TransportError};
