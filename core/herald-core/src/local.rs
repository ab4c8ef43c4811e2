//! Local banner checks.
//!
//! Most checks run on the banner service; a client only contributes checks
//! that need state the service cannot see. A producer is synchronous and runs
//! on every reconciliation, so it must stay cheap.

use herald_protocol::Banner;

pub trait LocalCheckProducer: Send {
    fn check(&self) -> Vec<Banner>;
}

/// Produces nothing. The default for clients with no local checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocalChecks;

impl LocalCheckProducer for NoLocalChecks {
    fn check(&self) -> Vec<Banner> {
        Vec::new()
    }
}

/// Always produces the same candidates.
#[derive(Debug, Default, Clone)]
pub struct StaticChecks(pub Vec<Banner>);

impl LocalCheckProducer for StaticChecks {
    fn check(&self) -> Vec<Banner> {
        self.0.clone()
    }
}

impl<F> LocalCheckProducer for F
where
    F: Fn() -> Vec<Banner> + Send,
{
    fn check(&self) -> Vec<Banner> {
        self()
    }
}
