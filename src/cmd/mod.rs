//! Subcommands of the `vigil` binary other than `run`.

pub mod replay;

pub use replay::ReplayArgs;
