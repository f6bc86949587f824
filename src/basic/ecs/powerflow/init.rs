use crate::basic::ecs::elements::*;
use crate::basic::ecs::plugin::PFInitStage;

use bevy_app::prelude::*;
use bevy_ecs::component::Mutable;
use bevy_ecs::prelude::*;
use bevy_ecs::system::SystemParam;
use nalgebra::Complex;
use num_traits::{One, Zero};

use super::systems::{InitialGuess, PowerFlowConfig, init_states};
use crate::basic::ecs::elements::trans::systems::setup_transformer;
use crate::basic::ecs::plugin::BuildNetwork;

#[derive(Component)]
#[component(storage = "SparseSet")]
pub struct PQBus;

#[derive(Component)]
#[component(storage = "SparseSet")]
pub struct PVBus;

#[derive(Component)]
#[component(storage = "SparseSet")]
pub struct SlackBus;

/// Routes every in-service element of type `T` to the `T1` state of its bus.
#[derive(SystemParam)]
pub struct NodeOp<'w, 's, T: Component, T1: Component<Mutability = Mutable>> {
    elements: Query<'w, 's, (&'static TargetBus, &'static T), Without<OutOfService>>,
    buses: Query<'w, 's, &'static mut T1>,
    node: Res<'w, NodeLookup>,
    common: Res<'w, PFCommonData>,
}

impl<'w, 's, T: Component, T1: Component<Mutability = Mutable>> NodeOp<'w, 's, T, T1> {
    pub fn inject<F>(&mut self, mut f: F)
    where
        F: FnMut(&T, &mut T1, f64),
    {
        let s_base_frac = 1.0 / self.common.sbase;
        for (target_bus, val) in self.elements.iter() {
            let Some(entity) = self.node.get_entity(target_bus.0) else {
                continue;
            };
            if let Ok(mut target) = self.buses.get_mut(entity) {
                f(val, &mut target, s_base_frac);
            }
        }
    }
}

/// Clears everything derived by a previous build so each solve starts from the components alone.
fn reset_network_state(
    mut cmd: Commands,
    cfg: Res<PowerFlowConfig>,
    branches: Query<Entity, With<BranchOf>>,
    mut buses: Query<(Entity, &BusID, &mut VBusPu, &mut SBusPu)>,
) {
    for entity in &branches {
        cmd.entity(entity).despawn();
    }
    for (entity, id, mut v, mut s) in &mut buses {
        cmd.entity(entity).remove::<(PQBus, PVBus, SlackBus)>();
        s.0 = Complex::zero();
        v.0 = match &cfg.init {
            InitialGuess::FlatStart => Complex::one(),
            InitialGuess::Custom(guess) => guess
                .get(id.0 as usize)
                .map_or(Complex::one(), |g| {
                    Complex::from_polar(g.vm_pu, g.va_degree.to_radians())
                }),
        };
    }
}

fn label_pq_nodes(
    mut cmd: Commands,
    query: Query<Entity, (With<BusID>, Without<PVBus>, Without<PQBus>, Without<SlackBus>)>,
) {
    for entity in &query {
        cmd.entity(entity).insert(PQBus);
    }
}

fn label_pv_nodes(
    mut cmd: Commands,
    nodes: Res<NodeLookup>,
    slack: Query<(), With<SlackBus>>,
    query: Query<&TargetBus, (With<Generator>, With<TargetVmPu>, Without<OutOfService>)>,
) {
    for target_bus in &query {
        if let Some(entity) = nodes.get_entity(target_bus.0) {
            if !slack.contains(entity) {
                cmd.entity(entity).insert(PVBus);
            }
        }
    }
}

fn label_slack_nodes(
    mut cmd: Commands,
    nodes: Res<NodeLookup>,
    query: Query<&TargetBus, (With<ExtGrid>, Without<OutOfService>)>,
) {
    for target_bus in &query {
        if let Some(entity) = nodes.get_entity(target_bus.0) {
            cmd.entity(entity).insert(SlackBus);
        }
    }
}

pub fn sgen_inj(mut sgen: NodeOp<SGenDevice, SBusPu>) {
    sgen.inject(|dev, state, sbase_frac| {
        state.0 += Complex::new(*dev.p_mw, *dev.q_mvar) * dev.scaling * sbase_frac;
    });
}

pub fn load_inj(mut load: NodeOp<LoadDevice, SBusPu>) {
    load.inject(|dev, state, sbase_frac| {
        state.0 -= Complex::new(*dev.p_mw, *dev.q_mvar) * dev.scaling * sbase_frac;
    });
}

pub fn p_mw_inj(mut target_p: NodeOp<TargetPMW, SBusPu>) {
    target_p.inject(|val, state, sbase_frac| {
        state.0.re += *val.0 * sbase_frac;
    });
}

pub fn v_inj(mut v: ParamSet<(NodeOp<TargetVmPu, VBusPu>, NodeOp<TargetVaDeg, VBusPu>)>) {
    v.p0().inject(|target_vm, data, _| {
        let angle = data.0.arg();
        data.0 = Complex::from_polar(*target_vm.0, angle);
    });
    v.p1().inject(|target_va, data, _| {
        data.0 = Complex::from_polar(data.0.norm(), target_va.0.to_radians());
    });
}

#[derive(Default)]
pub struct ElementSetupPlugin;
#[derive(Default)]
pub struct NodeTaggingPlugin;
#[derive(Default)]
pub struct MatBuilderPlugin;

impl Plugin for ElementSetupPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(BuildNetwork, reset_network_state.in_set(PFInitStage::Reset));
        app.add_systems(BuildNetwork, setup_transformer.in_set(PFInitStage::Topology));
    }
}

impl Plugin for NodeTaggingPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            BuildNetwork,
            (label_slack_nodes, label_pv_nodes, label_pq_nodes)
                .chain()
                .in_set(PFInitStage::Tagging),
        );
        app.add_systems(
            BuildNetwork,
            (sgen_inj, load_inj, p_mw_inj, v_inj)
                .chain()
                .in_set(PFInitStage::Injection),
        );
    }
}

impl Plugin for MatBuilderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(BuildNetwork, init_states.in_set(PFInitStage::Matrices));
    }
}
