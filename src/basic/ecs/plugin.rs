use bevy_app::{plugin_group, prelude::*};
use bevy_ecs::{prelude::*, schedule::ScheduleLabel};

use super::{
    elements::{NodeLookup, PFCommonData},
    network::PowerFlowSolver,
    post_processing::ResultExtractPlugin,
    powerflow::{
        init::{ElementSetupPlugin, MatBuilderPlugin, NodeTaggingPlugin},
        systems::{PowerFlowConfig, ecs_run_pf},
    },
};

/// Schedule that turns element components into [`PowerFlowMat`](super::powerflow::systems::PowerFlowMat).
#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildNetwork;

/// Schedule that solves the power flow and extracts results.
#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SolvePowerFlow;

/// Stages of [`BuildNetwork`], run in declaration order.
#[derive(Debug, SystemSet, Hash, Eq, PartialEq, Clone, Copy)]
pub enum PFInitStage {
    Reset,
    Topology,
    Tagging,
    Injection,
    Matrices,
}

/// Stages of [`SolvePowerFlow`].
#[derive(Clone, Copy, SystemSet, Debug, Hash, PartialEq, Eq)]
pub enum SolverStage {
    Solve,
    AfterSolve,
}

/// Base plugin for power flow calculations.
///
/// Inserts the shared resources and registers the Newton-Raphson run.
#[derive(Default)]
pub struct BasePFPlugin;

impl Plugin for BasePFPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PowerFlowConfig>()
            .init_resource::<PowerFlowSolver>()
            .init_resource::<NodeLookup>()
            .init_resource::<PFCommonData>();
        app.configure_sets(
            BuildNetwork,
            (
                PFInitStage::Reset,
                PFInitStage::Topology,
                PFInitStage::Tagging,
                PFInitStage::Injection,
                PFInitStage::Matrices,
            )
                .chain(),
        );
        app.configure_sets(
            SolvePowerFlow,
            (SolverStage::Solve, SolverStage::AfterSolve).chain(),
        );
        app.add_systems(SolvePowerFlow, ecs_run_pf.in_set(SolverStage::Solve));
    }
}

plugin_group! {
    /// Everything a [`PowerGrid`](super::network::PowerGrid) needs to build and solve.
    #[derive(Debug)]
    pub struct DefaultPlugins {
        :BasePFPlugin,
        :ElementSetupPlugin,
        // Identify PV PQ Ext Nodes.
        :NodeTaggingPlugin,
        // Build the power flow matrix.
        :MatBuilderPlugin,
        :ResultExtractPlugin
    }
}
