//! Petri 网执行引擎：线程仲裁监视器的底层基板.
//!
//! The crate exposes the generalized P/T net data model (inhibitor, reset
//! and reader arcs plus boolean transition guards), the enabledness
//! evaluator and the atomic firing operator. Higher-level schedulers build
//! on [`net::PetriNet`] to arbitrate threads competing for shared
//! resources; parsing, visualization and thread scheduling itself live in
//! collaborating crates.

pub mod net;

pub use net::{
    FireOutcome, NetBuilder, NetOptions, PetriNet, PetriNetError, PlaceId, TransitionId,
};
