//! 网结构的增量式构造入口：由弧描述推导矩阵并交付引擎.
use crate::net::core::{NetOptions, NetParts, PetriNet, PetriNetError};
use crate::net::ids::{PlaceId, TransitionId};
use crate::net::incidence::{Incidence, IncidenceBool};
use crate::net::index_vec::IndexVec;
use crate::net::structure::{Arc, ArcDirection, ArcKind, Marking, Place, Transition, Weight};

/// Accumulates descriptors and derives the matrix bundle on [`build`].
///
/// The extension matrices stay absent unless an arc of the corresponding
/// kind was added, so the engine can skip those checks wholesale.
///
/// [`build`]: NetBuilder::build
#[derive(Default, Debug, Clone)]
pub struct NetBuilder {
    places: IndexVec<PlaceId, Place>,
    transitions: IndexVec<TransitionId, Transition>,
    arcs: Vec<Arc>,
}

impl NetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_place(&mut self, place: Place) -> PlaceId {
        self.places.push(place)
    }

    pub fn add_transition(&mut self, transition: Transition) -> TransitionId {
        self.transitions.push(transition)
    }

    /// 输入弧: place -> transition
    pub fn add_input_arc(&mut self, place: PlaceId, transition: TransitionId, weight: Weight) {
        if weight == 0 {
            return;
        }
        self.arcs.push(Arc::input(place, transition, weight));
    }

    /// 输出弧: transition -> place
    pub fn add_output_arc(&mut self, place: PlaceId, transition: TransitionId, weight: Weight) {
        if weight == 0 {
            return;
        }
        self.arcs.push(Arc::output(place, transition, weight));
    }

    pub fn add_inhibitor_arc(&mut self, place: PlaceId, transition: TransitionId) {
        self.arcs.push(Arc::inhibitor(place, transition));
    }

    pub fn add_reset_arc(&mut self, place: PlaceId, transition: TransitionId) {
        self.arcs.push(Arc::reset(place, transition));
    }

    pub fn add_reader_arc(&mut self, place: PlaceId, transition: TransitionId, weight: Weight) {
        if weight == 0 {
            return;
        }
        self.arcs.push(Arc::reader(place, transition, weight));
    }

    pub fn build(self, options: NetOptions) -> Result<PetriNet, PetriNetError> {
        let places = self.places.len();
        let transitions = self.transitions.len();

        let mut pre = Incidence::<Weight>::new(places, transitions, 0);
        let mut post = Incidence::<Weight>::new(places, transitions, 0);
        let mut inhibition: Option<IncidenceBool> = None;
        let mut reset: Option<IncidenceBool> = None;
        let mut reader: Option<Incidence<Weight>> = None;

        for arc in &self.arcs {
            if !self.places.contains(arc.place) {
                return Err(PetriNetError::Malformed(format!(
                    "arc references place {:?} outside the net",
                    arc.place
                )));
            }
            if !self.transitions.contains(arc.transition) {
                return Err(PetriNetError::Malformed(format!(
                    "arc references transition {:?} outside the net",
                    arc.transition
                )));
            }
            match (arc.kind, arc.direction) {
                (ArcKind::Normal, ArcDirection::PlaceToTransition) => {
                    pre.accumulate(arc.place, arc.transition, arc.weight);
                }
                (ArcKind::Normal, ArcDirection::TransitionToPlace) => {
                    post.accumulate(arc.place, arc.transition, arc.weight);
                }
                (ArcKind::Inhibitor, _) => {
                    inhibition
                        .get_or_insert_with(|| IncidenceBool::new(places, transitions))
                        .set(arc.place, arc.transition, true);
                }
                (ArcKind::Reset, _) => {
                    reset
                        .get_or_insert_with(|| IncidenceBool::new(places, transitions))
                        .set(arc.place, arc.transition, true);
                }
                (ArcKind::Reader, _) => {
                    reader
                        .get_or_insert_with(|| Incidence::new(places, transitions, 0))
                        .accumulate(arc.place, arc.transition, arc.weight);
                }
            }
        }

        let inc = post.difference(&pre);
        let initial_marking = Marking::new(self.places.iter().map(|p| p.tokens).collect());

        PetriNet::from_parts(
            NetParts {
                places: self.places,
                transitions: self.transitions,
                arcs: self.arcs,
                initial_marking,
                pre,
                post,
                inc,
                inhibition,
                reset,
                reader,
            },
            options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::index_vec::Idx;
    use crate::net::structure::Guard;

    #[test]
    fn zero_weight_arcs_are_dropped() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 1));
        let t0 = builder.add_transition(Transition::new("t0"));
        builder.add_input_arc(p0, t0, 0);
        builder.add_reader_arc(p0, t0, 0);

        let net = builder.build(NetOptions::default()).unwrap();
        assert!(net.arcs().is_empty());
        assert!(!net.has_reader_arcs());
    }

    #[test]
    fn parallel_arcs_accumulate_weight() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 3));
        let t0 = builder.add_transition(Transition::new("t0"));
        builder.add_input_arc(p0, t0, 1);
        builder.add_input_arc(p0, t0, 1);

        let net = builder.build(NetOptions::default()).unwrap();
        assert_eq!(*net.pre().get(p0, t0), 2);
        assert_eq!(*net.inc().get(p0, t0), -2);
    }

    #[test]
    fn arc_to_foreign_transition_is_rejected() {
        let mut builder = NetBuilder::new();
        let p0 = builder.add_place(Place::new("p0", 0));
        builder.add_input_arc(p0, TransitionId::from_usize(7), 1);

        let err = builder.build(NetOptions::default()).unwrap_err();
        assert!(matches!(err, PetriNetError::Malformed(_)));
    }

    #[test]
    fn declared_guards_are_seeded_false() {
        let mut builder = NetBuilder::new();
        builder.add_place(Place::new("p0", 0));
        builder
            .add_transition(Transition::new("t0").with_guard(Guard::new("toggle", true)));

        let net = builder.build(NetOptions::default()).unwrap();
        net.initialize();
        assert_eq!(net.guard_count(), 1);
        assert_eq!(net.read_guard("toggle").unwrap(), false);
    }
}
