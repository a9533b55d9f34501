//! 运行时: 使能判定、原子发生语义、守卫更新与使能缓存维护.
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::guard::GuardTable;
use crate::net::ids::{PlaceId, TransitionId};
use crate::net::incidence::{Incidence, IncidenceBool};
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::{Arc, Marking, Place, Transition, Weight};

#[derive(Debug, Error)]
pub enum PetriNetError {
    #[error("transition {0:?} is out of bounds")]
    OutOfBounds(TransitionId),
    #[error("no place or transition named {0:?}")]
    UnknownNode(String),
    #[error("the net has not been initialized")]
    NotInitialized,
    #[error("no guard named {0:?}")]
    MissingGuard(String),
    #[error("malformed net: {0}")]
    Malformed(String),
}

/// Outcome of a firing attempt. A disabled transition is an ordinary
/// outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FireOutcome {
    Fired,
    NotEnabled,
}

/// Engine knobs supplied at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetOptions {
    /// Value every declared guard is seeded with. Guards start disabled
    /// unless a caller opts into a different seed.
    pub guard_initial: bool,
}

/// Factory-facing construction input. Matrices for absent arc kinds stay
/// `None`; an all-default matrix is accepted but the corresponding check
/// is still skipped during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetParts {
    pub places: IndexVec<PlaceId, Place>,
    pub transitions: IndexVec<TransitionId, Transition>,
    pub arcs: Vec<Arc>,
    pub initial_marking: Marking,
    pub pre: Incidence<Weight>,
    pub post: Incidence<Weight>,
    pub inc: Incidence<i64>,
    pub inhibition: Option<IncidenceBool>,
    pub reset: Option<IncidenceBool>,
    pub reader: Option<Incidence<Weight>>,
}

/// Everything immutable after construction: descriptors, the matrix
/// bundle and the latched initial marking. Safe to read without the net
/// lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetStructure {
    places: IndexVec<PlaceId, Place>,
    transitions: IndexVec<TransitionId, Transition>,
    arcs: Vec<Arc>,
    initial_marking: Marking,
    pre: Incidence<Weight>,
    post: Incidence<Weight>,
    inc: Incidence<i64>,
    inhibition: Option<IncidenceBool>,
    reset: Option<IncidenceBool>,
    reader: Option<Incidence<Weight>>,
    has_inhibition: bool,
    has_reset: bool,
    has_reader: bool,
    automatic: IndexVec<TransitionId, bool>,
    informed: IndexVec<TransitionId, bool>,
}

impl NetStructure {
    fn validated(parts: NetParts) -> Result<Self, PetriNetError> {
        let NetParts {
            places,
            transitions,
            arcs,
            initial_marking,
            pre,
            post,
            inc,
            inhibition,
            reset,
            reader,
        } = parts;

        let place_count = places.len();
        let transition_count = transitions.len();

        let mut seen = HashSet::new();
        for place in places.iter() {
            if !seen.insert(place.name.as_str()) {
                return Err(PetriNetError::Malformed(format!(
                    "duplicate place name {:?}",
                    place.name
                )));
            }
        }
        let mut seen = HashSet::new();
        for transition in transitions.iter() {
            if !seen.insert(transition.name.as_str()) {
                return Err(PetriNetError::Malformed(format!(
                    "duplicate transition name {:?}",
                    transition.name
                )));
            }
        }

        if initial_marking.len() != place_count {
            return Err(PetriNetError::Malformed(format!(
                "initial marking has {} entries for {} places",
                initial_marking.len(),
                place_count
            )));
        }

        for (label, rows, cols) in [
            ("pre", pre.places(), pre.transitions()),
            ("post", post.places(), post.transitions()),
            ("inc", inc.places(), inc.transitions()),
        ] {
            if rows != place_count || cols != transition_count {
                return Err(PetriNetError::Malformed(format!(
                    "{label} matrix is {rows}x{cols}, net is {place_count}x{transition_count}"
                )));
            }
        }
        if let Some(matrix) = &inhibition {
            if matrix.places() != place_count || matrix.transitions() != transition_count {
                return Err(PetriNetError::Malformed(
                    "inhibition matrix dimension mismatch".into(),
                ));
            }
        }
        if let Some(matrix) = &reset {
            if matrix.places() != place_count || matrix.transitions() != transition_count {
                return Err(PetriNetError::Malformed(
                    "reset matrix dimension mismatch".into(),
                ));
            }
        }
        if let Some(matrix) = &reader {
            if matrix.places() != place_count || matrix.transitions() != transition_count {
                return Err(PetriNetError::Malformed(
                    "reader matrix dimension mismatch".into(),
                ));
            }
        }

        if post.difference(&pre) != inc {
            return Err(PetriNetError::Malformed(
                "inc matrix is not post - pre".into(),
            ));
        }

        for arc in &arcs {
            if arc.place.index() >= place_count {
                return Err(PetriNetError::Malformed(format!(
                    "arc references place {:?} outside the net",
                    arc.place
                )));
            }
            if arc.transition.index() >= transition_count {
                return Err(PetriNetError::Malformed(format!(
                    "arc references transition {:?} outside the net",
                    arc.transition
                )));
            }
        }

        let has_inhibition = inhibition.as_ref().is_some_and(IncidenceBool::any_set);
        let has_reset = reset.as_ref().is_some_and(IncidenceBool::any_set);
        let has_reader = reader.as_ref().is_some_and(|m| m.any(|w| *w > 0));

        let automatic = transitions.iter().map(|t| t.label.automatic).collect();
        let informed = transitions.iter().map(|t| t.label.informed).collect();

        Ok(Self {
            places,
            transitions,
            arcs,
            initial_marking,
            pre,
            post,
            inc,
            inhibition,
            reset,
            reader,
            has_inhibition,
            has_reset,
            has_reader,
            automatic,
            informed,
        })
    }

    pub fn places(&self) -> &IndexVec<PlaceId, Place> {
        &self.places
    }

    pub fn transitions(&self) -> &IndexVec<TransitionId, Transition> {
        &self.transitions
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn initial_marking(&self) -> &Marking {
        &self.initial_marking
    }

    pub fn pre(&self) -> &Incidence<Weight> {
        &self.pre
    }

    pub fn post(&self) -> &Incidence<Weight> {
        &self.post
    }

    pub fn inc(&self) -> &Incidence<i64> {
        &self.inc
    }

    pub fn inhibition(&self) -> Option<&IncidenceBool> {
        self.inhibition.as_ref()
    }

    pub fn reset(&self) -> Option<&IncidenceBool> {
        self.reset.as_ref()
    }

    pub fn reader(&self) -> Option<&Incidence<Weight>> {
        self.reader.as_ref()
    }

    pub fn places_len(&self) -> usize {
        self.places.len()
    }

    pub fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    pub fn has_inhibitor_arcs(&self) -> bool {
        self.has_inhibition
    }

    pub fn has_reset_arcs(&self) -> bool {
        self.has_reset
    }

    pub fn has_reader_arcs(&self) -> bool {
        self.has_reader
    }

    fn is_reset_arc(&self, place: PlaceId, transition: TransitionId) -> bool {
        self.has_reset
            && self
                .reset
                .as_ref()
                .map(|matrix| matrix.get(place, transition))
                .unwrap_or(false)
    }

    /// The enabledness predicate: a pure conjunction over token
    /// sufficiency, the declared guard, inhibitor, reset and reader
    /// preconditions. Each extension check is skipped wholesale when the
    /// net carries no arcs of that kind.
    pub fn is_enabled(&self, transition: TransitionId, marking: &Marking, guards: &GuardTable) -> bool {
        if transition.index() >= self.transitions_len() {
            return false;
        }

        for (place, row) in self.pre.rows().iter_enumerated() {
            if marking.tokens(place) < row[transition.index()] {
                return false;
            }
        }

        if let Some(guard) = &self.transitions[transition].guard {
            if !guards.satisfied(guard) {
                return false;
            }
        }

        if self.has_inhibition {
            if let Some(matrix) = &self.inhibition {
                for place in self.places.indices() {
                    if matrix.get(place, transition) && marking.tokens(place) != 0 {
                        return false;
                    }
                }
            }
        }

        if self.has_reset {
            if let Some(matrix) = &self.reset {
                for place in self.places.indices() {
                    if matrix.get(place, transition) && marking.tokens(place) == 0 {
                        return false;
                    }
                }
            }
        }

        if self.has_reader {
            if let Some(matrix) = &self.reader {
                for (place, row) in matrix.rows().iter_enumerated() {
                    if marking.tokens(place) < row[transition.index()] {
                        return false;
                    }
                }
            }
        }

        true
    }
}

/// Strategy that rebuilds the enabled vector after a state change.
/// Specialized net variants (timed, stochastic) swap the strategy without
/// touching the firing operator.
pub trait EnabledPolicy: Send + Sync {
    fn recompute(
        &self,
        structure: &NetStructure,
        marking: &Marking,
        guards: &GuardTable,
    ) -> IndexVec<TransitionId, bool>;
}

/// Default Place/Transition semantics: the per-transition predicate for
/// every transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceTransitionPolicy;

impl EnabledPolicy for PlaceTransitionPolicy {
    fn recompute(
        &self,
        structure: &NetStructure,
        marking: &Marking,
        guards: &GuardTable,
    ) -> IndexVec<TransitionId, bool> {
        structure
            .transitions
            .indices()
            .map(|t| structure.is_enabled(t, marking, guards))
            .collect()
    }
}

/// 执行期可变状态，仅经由网级互斥锁访问.
struct ExecState {
    marking: Marking,
    guards: GuardTable,
    enabled: IndexVec<TransitionId, bool>,
    initialized: bool,
}

/// The execution engine. Descriptors and matrices are immutable; marking,
/// guard table and enabled cache mutate only inside the net lock, so every
/// fire and guard update is one atomic step to all observers.
pub struct PetriNet {
    structure: NetStructure,
    policy: Box<dyn EnabledPolicy>,
    state: Mutex<ExecState>,
}

impl PetriNet {
    pub fn from_parts(parts: NetParts, options: NetOptions) -> Result<Self, PetriNetError> {
        let structure = NetStructure::validated(parts)?;
        let guards = GuardTable::seeded(
            structure
                .transitions
                .iter()
                .filter_map(|t| t.guard.as_ref().map(|g| g.name.as_str())),
            options.guard_initial,
        );
        let state = ExecState {
            marking: structure.initial_marking.clone(),
            guards,
            enabled: IndexVec::from_elem(false, structure.transitions_len()),
            initialized: false,
        };
        Ok(Self {
            structure,
            policy: Box::new(PlaceTransitionPolicy),
            state: Mutex::new(state),
        })
    }

    /// Replaces the enabled-vector strategy. Meant for net variants and
    /// meant to run before [`initialize`](Self::initialize); the cache is
    /// re-derived from the new strategy on the next state change.
    pub fn with_policy(mut self, policy: Box<dyn EnabledPolicy>) -> Self {
        self.policy = policy;
        self
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ExecState> {
        self.state.lock().expect("net lock poisoned")
    }

    fn refresh_enabled(&self, state: &mut ExecState) {
        let ExecState {
            marking,
            guards,
            enabled,
            ..
        } = state;
        *enabled = self.policy.recompute(&self.structure, marking, guards);
    }

    /// Derives the enabled cache from current state and latches the
    /// initialized flag. Calling it again simply re-derives the cache.
    pub fn initialize(&self) {
        let mut state = self.lock_state();
        self.refresh_enabled(&mut state);
        state.initialized = true;
        log::info!(
            "net initialized: {} places, {} transitions, {} guards",
            self.structure.places_len(),
            self.structure.transitions_len(),
            state.guards.len()
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.lock_state().initialized
    }

    /// The atomic firing operator.
    pub fn fire(&self, transition: TransitionId) -> Result<FireOutcome, PetriNetError> {
        if transition.index() >= self.structure.transitions_len() {
            return Err(PetriNetError::OutOfBounds(transition));
        }

        let mut state = self.lock_state();
        if !state.initialized {
            return Err(PetriNetError::NotInitialized);
        }
        if !state.enabled[transition] {
            log::debug!("transition {:?} is not enabled", transition);
            return Ok(FireOutcome::NotEnabled);
        }

        for place in self.structure.places.indices() {
            let tokens = state.marking.tokens_mut(place);
            if self.structure.is_reset_arc(place, transition) {
                // 复位弧清空库所，覆盖该库所上的效应矩阵贡献.
                *tokens = 0;
            } else {
                let delta = *self.structure.inc.get(place, transition);
                *tokens = tokens
                    .checked_add_signed(delta)
                    .expect("enabled transition must keep the marking nonnegative");
            }
        }

        self.refresh_enabled(&mut state);
        log::debug!("fired {:?}, marking now {:?}", transition, state.marking);
        Ok(FireOutcome::Fired)
    }

    /// Reports the strategy's verdict for one transition under a
    /// consistent snapshot.
    pub fn is_enabled(&self, transition: TransitionId) -> Result<bool, PetriNetError> {
        if transition.index() >= self.structure.transitions_len() {
            return Err(PetriNetError::OutOfBounds(transition));
        }
        Ok(self.lock_state().enabled[transition])
    }

    /// Inserts or replaces a guard binding and refreshes the enabled
    /// cache. Returns `true` when an existing binding was replaced,
    /// `false` when the name was newly inserted.
    pub fn set_guard(&self, name: &str, value: bool) -> Result<bool, PetriNetError> {
        let mut state = self.lock_state();
        if !state.initialized {
            return Err(PetriNetError::NotInitialized);
        }
        let updated = state.guards.set(name, value);
        self.refresh_enabled(&mut state);
        log::debug!("guard {:?} set to {}", name, value);
        Ok(updated)
    }

    pub fn read_guard(&self, name: &str) -> Result<bool, PetriNetError> {
        self.lock_state()
            .guards
            .read(name)
            .ok_or_else(|| PetriNetError::MissingGuard(name.to_string()))
    }

    pub fn guard_count(&self) -> usize {
        self.lock_state().guards.len()
    }

    pub fn enabled_transitions(&self) -> IndexVec<TransitionId, bool> {
        self.lock_state().enabled.clone()
    }

    pub fn automatic_transitions(&self) -> IndexVec<TransitionId, bool> {
        self.structure.automatic.clone()
    }

    pub fn informed_transitions(&self) -> IndexVec<TransitionId, bool> {
        self.structure.informed.clone()
    }

    pub fn current_marking(&self) -> Marking {
        self.lock_state().marking.clone()
    }

    pub fn initial_marking(&self) -> &Marking {
        self.structure.initial_marking()
    }

    pub fn structure(&self) -> &NetStructure {
        &self.structure
    }

    pub fn places(&self) -> &IndexVec<PlaceId, Place> {
        self.structure.places()
    }

    pub fn transitions(&self) -> &IndexVec<TransitionId, Transition> {
        self.structure.transitions()
    }

    pub fn arcs(&self) -> &[Arc] {
        self.structure.arcs()
    }

    pub fn pre(&self) -> &Incidence<Weight> {
        self.structure.pre()
    }

    pub fn post(&self) -> &Incidence<Weight> {
        self.structure.post()
    }

    pub fn inc(&self) -> &Incidence<i64> {
        self.structure.inc()
    }

    pub fn reader(&self) -> Option<&Incidence<Weight>> {
        self.structure.reader()
    }

    pub fn has_inhibitor_arcs(&self) -> bool {
        self.structure.has_inhibitor_arcs()
    }

    pub fn has_reset_arcs(&self) -> bool {
        self.structure.has_reset_arcs()
    }

    pub fn has_reader_arcs(&self) -> bool {
        self.structure.has_reader_arcs()
    }

    /// Linear lookup by name. The returned descriptor carries the place's
    /// current token count, so readers of the place and readers of the
    /// marking vector always agree.
    pub fn get_place(&self, name: &str) -> Result<Place, PetriNetError> {
        let state = self.lock_state();
        self.structure
            .places
            .iter_enumerated()
            .find(|(_, place)| place.name == name)
            .map(|(id, place)| Place {
                name: place.name.clone(),
                tokens: state.marking.tokens(id),
            })
            .ok_or_else(|| PetriNetError::UnknownNode(name.to_string()))
    }

    pub fn get_transition(&self, name: &str) -> Result<&Transition, PetriNetError> {
        self.structure
            .transitions
            .iter()
            .find(|transition| transition.name == name)
            .ok_or_else(|| PetriNetError::UnknownNode(name.to_string()))
    }

    /// 诊断信息：检测网中的孤立节点和连通性问题.
    pub fn diagnose_connectivity(&self) -> DiagnosticReport {
        let mut report = DiagnosticReport {
            total_places: self.structure.places_len(),
            total_transitions: self.structure.transitions_len(),
            ..DiagnosticReport::default()
        };

        for (place, descriptor) in self.structure.places.iter_enumerated() {
            let feeds = self.structure.pre.rows()[place].iter().any(|w| *w > 0);
            let fed = self.structure.post.rows()[place].iter().any(|w| *w > 0);
            let consulted = self.structure.transitions.indices().any(|t| {
                self.structure
                    .inhibition
                    .as_ref()
                    .is_some_and(|m| m.get(place, t))
                    || self.structure.reset.as_ref().is_some_and(|m| m.get(place, t))
                    || self
                        .structure
                        .reader
                        .as_ref()
                        .is_some_and(|m| *m.get(place, t) > 0)
            });

            if !feeds && !fed && !consulted {
                report
                    .isolated_places
                    .push((place, descriptor.name.clone()));
            } else if !fed && descriptor.tokens == 0 {
                report.warnings.push(format!(
                    "库所 '{}' (id={}) 无输入弧且初始标记为 0，永远为空",
                    descriptor.name,
                    place.index()
                ));
            }
        }

        for (transition, descriptor) in self.structure.transitions.iter_enumerated() {
            let consumes = self
                .structure
                .pre
                .rows()
                .iter()
                .any(|row| row[transition.index()] > 0);
            let produces = self
                .structure
                .post
                .rows()
                .iter()
                .any(|row| row[transition.index()] > 0);
            let constrained = descriptor.guard.is_some()
                || self.structure.places.indices().any(|p| {
                    self.structure
                        .inhibition
                        .as_ref()
                        .is_some_and(|m| m.get(p, transition))
                        || self
                            .structure
                            .reset
                            .as_ref()
                            .is_some_and(|m| m.get(p, transition))
                        || self
                            .structure
                            .reader
                            .as_ref()
                            .is_some_and(|m| *m.get(p, transition) > 0)
                });

            if !consumes && !produces && !constrained {
                report
                    .isolated_transitions
                    .push((transition, descriptor.name.clone()));
            } else if !consumes && !constrained {
                report.warnings.push(format!(
                    "变迁 '{}' (id={}) 无前置条件，永远处于使能状态",
                    descriptor.name,
                    transition.index()
                ));
            }
        }

        report
    }

    /// 打印诊断报告到日志.
    pub fn log_diagnostics(&self) {
        let report = self.diagnose_connectivity();

        if report.has_issues() {
            log::warn!("=== Petri 网连通性诊断报告 ===");
            log::warn!(
                "总计: {} 个库所, {} 个变迁",
                report.total_places,
                report.total_transitions
            );

            if !report.isolated_places.is_empty() {
                log::warn!("发现 {} 个孤立库所:", report.isolated_places.len());
                for (id, name) in &report.isolated_places {
                    log::warn!("  - [{}] {}", id.index(), name);
                }
            }

            if !report.isolated_transitions.is_empty() {
                log::warn!("发现 {} 个孤立变迁:", report.isolated_transitions.len());
                for (id, name) in &report.isolated_transitions {
                    log::warn!("  - [{}] {}", id.index(), name);
                }
            }

            if !report.warnings.is_empty() {
                log::warn!("其他警告 ({}):", report.warnings.len());
                for warning in &report.warnings {
                    log::warn!("  - {}", warning);
                }
            }
            log::warn!("=== 诊断报告结束 ===");
        } else {
            log::info!("Petri 网连通性检查通过，无孤立节点");
        }
    }
}

impl fmt::Debug for PetriNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PetriNet")
            .field("places", &self.structure.places)
            .field("transitions", &self.structure.transitions)
            .field("marking", &self.current_marking())
            .finish()
    }
}

/// Petri 网连通性诊断报告.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    pub isolated_places: Vec<(PlaceId, String)>,
    pub isolated_transitions: Vec<(TransitionId, String)>,
    pub warnings: Vec<String>,
    pub total_places: usize,
    pub total_transitions: usize,
}

impl DiagnosticReport {
    pub fn has_issues(&self) -> bool {
        !self.isolated_places.is_empty()
            || !self.isolated_transitions.is_empty()
            || !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::builder::NetBuilder;
    use crate::net::structure::{Guard, TransitionLabel};

    /// p0 --1--> t0 --1--> p1, two tokens on p0.
    fn simple_chain() -> (PetriNet, PlaceId, PlaceId, TransitionId) {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 2));
        let p1 = builder.add_place(Place::new("p1", 0));
        let t0 = builder.add_transition(Transition::new("t0"));
        builder.add_input_arc(p0, t0, 1);
        builder.add_output_arc(p1, t0, 1);
        let net = builder.build(NetOptions::default()).unwrap();
        net.initialize();
        (net, p0, p1, t0)
    }

    fn one_place_one_transition() -> NetParts {
        let mut places = IndexVec::new();
        places.push(Place::new("p0", 1));
        let mut transitions = IndexVec::new();
        transitions.push(Transition::new("t0"));
        let pre = Incidence::new(1, 1, 0u64);
        let post = Incidence::new(1, 1, 0u64);
        let inc = post.difference(&pre);
        NetParts {
            places,
            transitions,
            arcs: Vec::new(),
            initial_marking: Marking::new(IndexVec::from_vec(vec![1])),
            pre,
            post,
            inc,
            inhibition: None,
            reset: None,
            reader: None,
        }
    }

    #[test]
    fn simple_producer_consumer_step() {
        let (net, p0, p1, t0) = simple_chain();

        assert_eq!(net.fire(t0).unwrap(), FireOutcome::Fired);
        assert_eq!(net.current_marking().tokens(p0), 1);
        assert_eq!(net.current_marking().tokens(p1), 1);

        assert_eq!(net.fire(t0).unwrap(), FireOutcome::Fired);
        assert_eq!(net.current_marking().tokens(p0), 0);
        assert_eq!(net.current_marking().tokens(p1), 2);

        assert_eq!(net.fire(t0).unwrap(), FireOutcome::NotEnabled);
        assert_eq!(net.current_marking().tokens(p0), 0);
        assert_eq!(net.current_marking().tokens(p1), 2);
    }

    #[test]
    fn reset_arc_dominates_effect_matrix() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 3));
        let t0 = builder.add_transition(Transition::new("t0"));
        builder.add_input_arc(p0, t0, 1);
        builder.add_reset_arc(p0, t0);
        let net = builder.build(NetOptions::default()).unwrap();
        net.initialize();
        assert!(net.has_reset_arcs());

        assert_eq!(net.fire(t0).unwrap(), FireOutcome::Fired);
        assert_eq!(net.current_marking().tokens(p0), 0);

        // An empty reset source forbids firing.
        assert_eq!(net.fire(t0).unwrap(), FireOutcome::NotEnabled);
        assert_eq!(net.current_marking().tokens(p0), 0);
    }

    #[test]
    fn reset_from_empty_source_without_pre_arc() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 0));
        let t0 = builder.add_transition(Transition::new("t0"));
        builder.add_reset_arc(p0, t0);
        let net = builder.build(NetOptions::default()).unwrap();
        net.initialize();

        assert_eq!(net.fire(t0).unwrap(), FireOutcome::NotEnabled);
    }

    #[test]
    fn inhibitor_blocks_until_source_drains() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 1));
        let p1 = builder.add_place(Place::new("p1", 0));
        let t0 = builder.add_transition(Transition::new("t0"));
        let drain = builder.add_transition(Transition::new("drain"));
        builder.add_output_arc(p1, t0, 1);
        builder.add_inhibitor_arc(p0, t0);
        builder.add_input_arc(p0, drain, 1);
        let net = builder.build(NetOptions::default()).unwrap();
        net.initialize();
        assert!(net.has_inhibitor_arcs());

        assert_eq!(net.fire(t0).unwrap(), FireOutcome::NotEnabled);
        assert_eq!(net.fire(drain).unwrap(), FireOutcome::Fired);
        assert_eq!(net.fire(t0).unwrap(), FireOutcome::Fired);
        assert_eq!(net.current_marking().tokens(p0), 0);
        assert_eq!(net.current_marking().tokens(p1), 1);
    }

    #[test]
    fn reader_arc_requires_without_consuming() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 2));
        let p1 = builder.add_place(Place::new("p1", 0));
        let t0 = builder.add_transition(Transition::new("t0"));
        builder.add_reader_arc(p0, t0, 2);
        builder.add_output_arc(p1, t0, 1);
        let net = builder.build(NetOptions::default()).unwrap();
        net.initialize();
        assert!(net.has_reader_arcs());

        assert_eq!(net.fire(t0).unwrap(), FireOutcome::Fired);
        assert_eq!(net.current_marking().tokens(p0), 2);
        assert_eq!(net.current_marking().tokens(p1), 1);
    }

    #[test]
    fn reader_arc_under_threshold_disables() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 1));
        let p1 = builder.add_place(Place::new("p1", 0));
        let t0 = builder.add_transition(Transition::new("t0"));
        builder.add_reader_arc(p0, t0, 2);
        builder.add_output_arc(p1, t0, 1);
        let net = builder.build(NetOptions::default()).unwrap();
        net.initialize();

        assert_eq!(net.fire(t0).unwrap(), FireOutcome::NotEnabled);
        assert_eq!(net.current_marking().tokens(p1), 0);
    }

    #[test]
    fn guard_flip_is_reflected_immediately() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 1));
        let t0 = builder
            .add_transition(Transition::new("t0").with_guard(Guard::new("g", true)));
        builder.add_input_arc(p0, t0, 1);
        let net = builder.build(NetOptions::default()).unwrap();
        net.initialize();

        assert_eq!(net.read_guard("g").unwrap(), false);
        assert!(!net.enabled_transitions()[t0]);
        assert_eq!(net.fire(t0).unwrap(), FireOutcome::NotEnabled);

        // Seeded binding exists, so the update reports a replacement.
        assert_eq!(net.set_guard("g", true).unwrap(), true);
        assert!(net.enabled_transitions()[t0]);
        assert_eq!(net.fire(t0).unwrap(), FireOutcome::Fired);
    }

    #[test]
    fn contended_firing_consumes_each_token_once() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 5));
        let t0 = builder.add_transition(Transition::new("t0"));
        builder.add_input_arc(p0, t0, 1);
        let net = builder.build(NetOptions::default()).unwrap();
        net.initialize();

        let fired = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| net.fire(t0).unwrap()))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|outcome| *outcome == FireOutcome::Fired)
                .count()
        });

        assert_eq!(fired, 5);
        assert_eq!(net.current_marking().tokens(p0), 0);
    }

    #[test]
    fn out_of_bounds_transition_is_rejected() {
        let (net, p0, _, _) = simple_chain();
        let bogus = TransitionId::from_usize(9);

        assert!(matches!(
            net.fire(bogus),
            Err(PetriNetError::OutOfBounds(_))
        ));
        assert!(matches!(
            net.is_enabled(bogus),
            Err(PetriNetError::OutOfBounds(_))
        ));
        assert_eq!(net.current_marking().tokens(p0), 2);
    }

    #[test]
    fn mutation_before_initialize_is_rejected() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 1));
        let t0 = builder.add_transition(Transition::new("t0"));
        builder.add_input_arc(p0, t0, 1);
        let net = builder.build(NetOptions::default()).unwrap();

        assert!(!net.is_initialized());
        assert!(matches!(net.fire(t0), Err(PetriNetError::NotInitialized)));
        assert!(matches!(
            net.set_guard("g", true),
            Err(PetriNetError::NotInitialized)
        ));

        net.initialize();
        assert!(net.is_initialized());
        assert_eq!(net.fire(t0).unwrap(), FireOutcome::Fired);
    }

    #[test]
    fn set_guard_distinguishes_insert_from_update() {
        let (net, ..) = simple_chain();

        assert_eq!(net.guard_count(), 0);
        assert_eq!(net.set_guard("fresh", true).unwrap(), false);
        assert_eq!(net.guard_count(), 1);
        assert_eq!(net.set_guard("fresh", false).unwrap(), true);
        assert_eq!(net.read_guard("fresh").unwrap(), false);
    }

    #[test]
    fn reading_an_unknown_guard_fails() {
        let (net, ..) = simple_chain();
        assert!(matches!(
            net.read_guard("nope"),
            Err(PetriNetError::MissingGuard(_))
        ));
    }

    #[test]
    fn initial_marking_survives_firings() {
        let (net, p0, p1, t0) = simple_chain();
        net.fire(t0).unwrap();
        net.fire(t0).unwrap();

        assert_eq!(net.initial_marking().tokens(p0), 2);
        assert_eq!(net.initial_marking().tokens(p1), 0);
    }

    #[test]
    fn firing_an_inverse_restores_the_marking() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 2));
        let p1 = builder.add_place(Place::new("p1", 0));
        let t0 = builder.add_transition(Transition::new("t0"));
        let t1 = builder.add_transition(Transition::new("t1"));
        builder.add_input_arc(p0, t0, 1);
        builder.add_output_arc(p1, t0, 1);
        builder.add_input_arc(p1, t1, 1);
        builder.add_output_arc(p0, t1, 1);
        let net = builder.build(NetOptions::default()).unwrap();
        net.initialize();

        let before = net.current_marking();
        net.fire(t0).unwrap();
        net.fire(t1).unwrap();
        assert_eq!(net.current_marking(), before);
    }

    #[test]
    fn fire_without_reset_adds_the_effect_column() {
        let (net, p0, p1, t0) = simple_chain();
        let before = net.current_marking();
        net.fire(t0).unwrap();
        let after = net.current_marking();

        for place in [p0, p1] {
            let expected = before
                .tokens(place)
                .checked_add_signed(*net.inc().get(place, t0))
                .unwrap();
            assert_eq!(after.tokens(place), expected);
        }
        assert_eq!(after.total(), before.total());
    }

    #[test]
    fn enabled_cache_tracks_every_mutation() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 1));
        let t0 = builder.add_transition(Transition::new("t0"));
        let t1 = builder
            .add_transition(Transition::new("t1").with_guard(Guard::new("g", true)));
        builder.add_input_arc(p0, t0, 1);
        builder.add_output_arc(p0, t1, 1);
        let net = builder.build(NetOptions::default()).unwrap();
        net.initialize();

        assert!(net.enabled_transitions()[t0]);
        assert!(!net.enabled_transitions()[t1]);

        net.set_guard("g", true).unwrap();
        assert!(net.enabled_transitions()[t1]);

        net.fire(t0).unwrap();
        assert!(!net.enabled_transitions()[t0]);
        assert!(net.enabled_transitions()[t1]);

        net.fire(t1).unwrap();
        assert!(net.enabled_transitions()[t0]);
    }

    #[test]
    fn from_parts_rejects_wrong_effect_matrix() {
        let mut parts = one_place_one_transition();
        parts
            .inc
            .set(PlaceId::from_usize(0), TransitionId::from_usize(0), 5);
        assert!(matches!(
            PetriNet::from_parts(parts, NetOptions::default()),
            Err(PetriNetError::Malformed(_))
        ));
    }

    #[test]
    fn from_parts_rejects_dimension_mismatch() {
        let mut parts = one_place_one_transition();
        parts.pre = Incidence::new(2, 1, 0u64);
        assert!(matches!(
            PetriNet::from_parts(parts, NetOptions::default()),
            Err(PetriNetError::Malformed(_))
        ));
    }

    #[test]
    fn from_parts_rejects_marking_length_mismatch() {
        let mut parts = one_place_one_transition();
        parts.initial_marking = Marking::new(IndexVec::from_vec(vec![1, 0]));
        assert!(matches!(
            PetriNet::from_parts(parts, NetOptions::default()),
            Err(PetriNetError::Malformed(_))
        ));
    }

    #[test]
    fn from_parts_rejects_duplicate_names() {
        let mut parts = one_place_one_transition();
        parts.places.push(Place::new("p0", 0));
        parts.initial_marking = Marking::new(IndexVec::from_vec(vec![1, 0]));
        parts.pre = Incidence::new(2, 1, 0u64);
        parts.post = Incidence::new(2, 1, 0u64);
        parts.inc = parts.post.difference(&parts.pre);
        assert!(matches!(
            PetriNet::from_parts(parts, NetOptions::default()),
            Err(PetriNetError::Malformed(_))
        ));
    }

    #[test]
    fn guard_seed_value_is_configurable() {
        let mut builder = NetBuilder::new();
        builder.add_place(Place::new("p0", 0));
        builder
            .add_transition(Transition::new("t0").with_guard(Guard::new("g", true)));
        let net = builder
            .build(NetOptions {
                guard_initial: true,
            })
            .unwrap();
        net.initialize();

        assert_eq!(net.read_guard("g").unwrap(), true);
        assert!(net.enabled_transitions()[TransitionId::from_usize(0)]);
    }

    #[test]
    fn label_vectors_follow_the_descriptors() {
        let mut builder = NetBuilder::new();
        builder.add_place(Place::new("p0", 0));
        let auto = builder.add_transition(
            Transition::new("auto").with_label(TransitionLabel::new(true, false)),
        );
        let informed = builder.add_transition(
            Transition::new("informed").with_label(TransitionLabel::new(false, true)),
        );
        let net = builder.build(NetOptions::default()).unwrap();

        assert!(net.automatic_transitions()[auto]);
        assert!(!net.automatic_transitions()[informed]);
        assert!(net.informed_transitions()[informed]);
        assert!(!net.informed_transitions()[auto]);
    }

    #[test]
    fn place_lookup_reports_the_live_token_count() {
        let (net, _, _, t0) = simple_chain();
        assert_eq!(net.get_place("p0").unwrap().tokens, 2);

        net.fire(t0).unwrap();
        assert_eq!(net.get_place("p0").unwrap().tokens, 1);
        assert_eq!(net.get_place("p1").unwrap().tokens, 1);

        assert!(matches!(
            net.get_place("absent"),
            Err(PetriNetError::UnknownNode(_))
        ));
        assert_eq!(net.get_transition("t0").unwrap().name, "t0");
        assert!(matches!(
            net.get_transition(""),
            Err(PetriNetError::UnknownNode(_))
        ));
    }

    #[test]
    fn policy_override_replaces_the_enabled_vector() {
        struct NothingEnabled;

        impl EnabledPolicy for NothingEnabled {
            fn recompute(
                &self,
                structure: &NetStructure,
                _marking: &Marking,
                _guards: &GuardTable,
            ) -> IndexVec<TransitionId, bool> {
                IndexVec::from_elem(false, structure.transitions_len())
            }
        }

        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 2));
        let t0 = builder.add_transition(Transition::new("t0"));
        builder.add_input_arc(p0, t0, 1);
        let net = builder
            .build(NetOptions::default())
            .unwrap()
            .with_policy(Box::new(NothingEnabled));
        net.initialize();

        assert!(!net.is_enabled(t0).unwrap());
        assert_eq!(net.fire(t0).unwrap(), FireOutcome::NotEnabled);
        assert_eq!(net.current_marking().tokens(p0), 2);
    }

    #[test]
    fn initialize_rederives_the_cache() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 1));
        let t0 = builder.add_transition(Transition::new("t0"));
        builder.add_input_arc(p0, t0, 1);
        let net = builder.build(NetOptions::default()).unwrap();
        net.initialize();
        net.fire(t0).unwrap();

        net.initialize();
        assert!(!net.enabled_transitions()[t0]);
        assert_eq!(net.current_marking().tokens(p0), 0);
    }

    #[test]
    fn connectivity_diagnostics_flag_isolated_nodes() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut builder = NetBuilder::new();
        builder.add_place(Place::new("stray", 0));
        let p1 = builder.add_place(Place::new("p1", 0));
        builder.add_transition(Transition::new("source"));
        let sink = builder.add_transition(Transition::new("sink"));
        builder.add_input_arc(p1, sink, 1);
        let net = builder.build(NetOptions::default()).unwrap();

        let report = net.diagnose_connectivity();
        assert!(report.has_issues());
        assert_eq!(report.total_places, 2);
        assert_eq!(report.total_transitions, 2);
        assert_eq!(report.isolated_places.len(), 1);
        assert_eq!(report.isolated_places[0].1, "stray");
        assert_eq!(report.isolated_transitions.len(), 1);
        assert_eq!(report.isolated_transitions[0].1, "source");
        net.log_diagnostics();
    }
}
