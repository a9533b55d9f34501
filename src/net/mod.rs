//! # Petri 网核心定义与执行语义（Place/Transition Net）
//!
//! 设离散库所集合  P  与变迁集合  T ,基数分别为  |P|  与  |T| .
//! 定义输入/输出映射  Pre, Post ∈ ℕ^{|P|×|T|} ,变迁效应矩阵
//!  C = Post - Pre ,读弧映射  R ∈ ℕ^{|P|×|T|} ,抑制弧与复位弧关系
//!  H, Z ⊆ P × T .对任意标识  M ∈ ℕ^{|P|}  与守卫赋值  G :
//!
//! * 变迁  t ∈ T  可发生当且仅当满足:
//!   1.  ∀p ∈ P: M[p] ≥ Pre[p, t];
//!   2. 若  t  声明守卫  (g, v) ,则  G[g] = v;
//!   3.  ∀(p, t) ∈ H: M[p] = 0;
//!   4.  ∀(p, t) ∈ Z: M[p] > 0;
//!   5.  ∀p ∈ P: M[p] ≥ R[p, t].
//! * 变迁发生后标识满足  M'[p] = 0 (当  (p, t) ∈ Z ),否则
//!    M'[p] = M[p] + C[p, t] .
//!
//! ## 示例
//!
//! ```rust
//! use ptnet::net::*;
//!
//! let mut builder = NetBuilder::new();
//! let p0 = builder.add_place(Place::new("p0", 2));
//! let p1 = builder.add_place(Place::new("p1", 0));
//! let t0 = builder.add_transition(Transition::new("t0"));
//!
//! builder.add_input_arc(p0, t0, 1);
//! builder.add_output_arc(p1, t0, 1);
//!
//! let net = builder.build(NetOptions::default()).unwrap();
//! net.initialize();
//! assert_eq!(net.fire(t0).unwrap(), FireOutcome::Fired);
//! assert_eq!(net.current_marking().tokens(p1), 1);
//! ```

pub mod builder;
pub mod core;
pub mod guard;
pub mod ids;
pub mod incidence;
pub mod index_vec;
pub mod structure;

pub use self::core::{
    DiagnosticReport, EnabledPolicy, FireOutcome, NetOptions, NetParts, NetStructure, PetriNet,
    PetriNetError, PlaceTransitionPolicy,
};
pub use builder::NetBuilder;
pub use guard::GuardTable;
pub use ids::{PlaceId, TransitionId};
pub use incidence::{Incidence, IncidenceBool};
pub use index_vec::{Idx, IndexVec};
pub use structure::{
    Arc, ArcDirection, ArcKind, Guard, Marking, Place, Transition, TransitionLabel, Weight,
};
