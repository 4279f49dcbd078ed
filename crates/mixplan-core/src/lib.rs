pub mod arith;
pub mod config;
pub mod forest;
pub mod potency;
pub mod problem;
pub mod random_provider;
pub mod target;

pub use arith::{factorize, gcd, lcm, lcm_all, unique_permutations};
pub use config::{InterSharingMode, Objective, RandomConfig, RunConfig, RunMode, SolverConfig};
pub use forest::{MixTree, NodeId, build_forest};
pub use potency::PotencyTable;
pub use problem::{MixProblem, SharingPolicy};
pub use target::Target;

pub use mixplan_error::{MixError, MixResult, ensure, mix_bail, mix_err};

pub mod prelude {
    pub use super::arith::{factorize, lcm_all, unique_permutations};
    pub use super::config::{
        InterSharingMode, Objective, RandomConfig, RunConfig, RunMode, SolverConfig,
    };
    pub use super::forest::{MixTree, NodeId, build_forest};
    pub use super::potency::PotencyTable;
    pub use super::problem::{MixProblem, SharingPolicy};
    pub use super::target::Target;
    pub use mixplan_error::{MixError, MixResult};
}
