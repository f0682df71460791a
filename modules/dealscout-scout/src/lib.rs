pub mod budget;
pub mod confidence;
pub mod fees;
pub mod freshness;
pub mod harvester;
pub mod intent;
pub mod matcher;
pub mod pipeline;
pub mod run_log;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod verifier;
