pub mod config;
pub mod domain {
    pub mod insight;
    pub mod processor;
    pub mod routing_decision;
    pub mod routing_step;
    pub mod transaction;
}
pub mod error;
pub mod execution;
pub mod health {
    pub mod monitor;
    pub mod state;
    pub mod transitions;
}
pub mod insights;
pub mod router {
    pub mod engine;
    pub mod ranking;
}
pub mod scoring {
    pub mod engine;
    pub mod insight_reader;
    pub mod types;
}
pub mod trace {
    pub mod publisher;
}

pub use router::engine::RoutingEngine;
