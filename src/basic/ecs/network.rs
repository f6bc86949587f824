use std::collections::VecDeque;

use bevy_app::prelude::*;
use bevy_ecs::{component::Mutable, name::Name, prelude::*};
use tracing::{debug, info, warn};

use crate::basic::solver::DefaultSolver;
use crate::error::{Result, SimError};

use super::{
    elements::*,
    plugin::{BuildNetwork, DefaultPlugins, SolvePowerFlow},
    post_processing::PowerFlowResult,
    powerflow::systems::{InitialGuess, PowerFlowConfig},
};

#[derive(Default, Resource)]
pub struct PowerFlowSolver {
    pub solver: DefaultSolver,
}

/// Represents the ground node in the network.
pub const GND: i64 = -1;

/// Relative tolerance between a transformer's rated voltage and the bus it connects to.
pub const VOLTAGE_MATCH_TOLERANCE: f64 = 0.1;

/// Represents the power grid, managing the ECS world for power flow calculations.
///
/// Elements are spawned as entities by the `add_*` builders, which reject references to
/// unknown buses right away. The whole network is validated again before every solve.
pub struct PowerGrid {
    data_storage: App,
}

impl Default for PowerGrid {
    fn default() -> Self {
        Self::with_base(1.0)
    }
}

/// Trait for performing operations on ECS data, such as getting and mutating components of entities.
pub trait DataOps {
    fn get_mut<T>(&'_ mut self, entity: Entity) -> Option<Mut<'_, T>>
    where
        T: Component<Mutability = Mutable>;
    fn get<T>(&self, entity: Entity) -> Option<&T>
    where
        T: Component;
    fn world_mut(&mut self) -> &mut World;
    fn world(&self) -> &World;
}

/// Trait for defining power flow operations.
pub trait PowerFlow {
    /// Validates the network and assembles the power flow matrices.
    fn init_pf_net(&mut self) -> Result<()>;

    /// Runs Newton-Raphson and returns the result, converged or not.
    fn run_pf(&mut self) -> Result<PowerFlowResult>;

    /// Like [`PowerFlow::run_pf`], but non-convergence is an error carrying the last iterate.
    fn solve(&mut self) -> Result<PowerFlowResult> {
        let res = self.run_pf()?;
        if res.converged {
            Ok(res)
        } else {
            Err(SimError::SolverDivergence(Box::new(res)))
        }
    }
}

impl PowerGrid {
    /// Creates an empty grid on the system base `sn_mva`.
    pub fn new(sn_mva: f64) -> Result<Self> {
        if !(sn_mva.is_finite() && sn_mva > 0.0) {
            return Err(SimError::invalid_network(format!(
                "system base must be positive, got {sn_mva} MVA"
            )));
        }
        Ok(Self::with_base(sn_mva))
    }

    fn with_base(sn_mva: f64) -> Self {
        let mut app = App::new();
        app.add_plugins(DefaultPlugins);
        app.insert_resource(PFCommonData { sbase: sn_mva });
        PowerGrid { data_storage: app }
    }

    pub fn app(&self) -> &App {
        &self.data_storage
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.data_storage
    }

    pub fn s_base(&self) -> f64 {
        self.world().resource::<PFCommonData>().sbase
    }

    pub fn bus_count(&self) -> usize {
        self.world().resource::<NodeLookup>().len()
    }

    pub fn bus_entity(&self, id: i64) -> Option<Entity> {
        self.world().resource::<NodeLookup>().get_entity(id)
    }

    pub fn power_flow_config(&self) -> &PowerFlowConfig {
        self.world().resource::<PowerFlowConfig>()
    }

    pub fn set_power_flow_config(&mut self, cfg: PowerFlowConfig) {
        self.world_mut().insert_resource(cfg);
    }

    /// Adds a bus with the default 0.9..1.1 pu voltage band.
    pub fn add_bus(&mut self, id: i64, name: impl Into<String>, vn_kv: f64) -> Result<Entity> {
        self.add_bus_with_limits(id, name, vn_kv, VmLimit::default())
    }

    pub fn add_bus_with_limits(
        &mut self,
        id: i64,
        name: impl Into<String>,
        vn_kv: f64,
        vm_limit: VmLimit,
    ) -> Result<Entity> {
        if id < 0 {
            return Err(SimError::invalid_network(format!("bus id {id} is negative")));
        }
        if self.bus_entity(id).is_some() {
            return Err(SimError::invalid_network(format!("bus {id} already exists")));
        }
        if !(vn_kv.is_finite() && vn_kv > 0.0) {
            return Err(SimError::invalid_network(format!(
                "bus {id} nominal voltage must be positive, got {vn_kv} kV"
            )));
        }
        if !(vm_limit.min < vm_limit.max) {
            return Err(SimError::invalid_network(format!(
                "bus {id} voltage band {}..{} is empty",
                vm_limit.min, vm_limit.max
            )));
        }
        let entity = self
            .world_mut()
            .spawn(BusBundle::new(id, name, vn_kv, vm_limit))
            .id();
        self.world_mut().resource_mut::<NodeLookup>().insert(id, entity);
        Ok(entity)
    }

    /// Connects the external grid, which holds `vm_pu` and `va_degree` at `bus`.
    pub fn add_slack(&mut self, bus: i64, vm_pu: f64, va_degree: f64) -> Result<Entity> {
        self.require_bus(bus)?;
        check_setpoint(vm_pu)?;
        if self.count_in_service::<ExtGrid>() > 0 {
            return Err(SimError::invalid_network("network already has a slack bus"));
        }
        Ok(self
            .world_mut()
            .spawn(ExtGridBundle::new(bus, vm_pu, va_degree))
            .id())
    }

    /// Adds a voltage-controlled generator, making `bus` a PV bus.
    pub fn add_pv_generator(
        &mut self,
        name: impl Into<String>,
        bus: i64,
        p_mw: Megawatts,
        vm_pu: f64,
    ) -> Result<Entity> {
        self.require_bus(bus)?;
        check_setpoint(vm_pu)?;
        check_power(*p_mw, 0.0)?;
        Ok(self
            .world_mut()
            .spawn(GeneratorBundle::new(name, bus, p_mw, vm_pu))
            .id())
    }

    /// Adds a two-winding transformer from `hv_bus` to `lv_bus`.
    pub fn add_transformer(
        &mut self,
        name: impl Into<String>,
        hv_bus: i64,
        lv_bus: i64,
        device: TransformerDevice,
    ) -> Result<Entity> {
        let hv_kv = self.require_bus(hv_bus)?;
        let lv_kv = self.require_bus(lv_bus)?;
        check_transformer(&device, (hv_bus, hv_kv), (lv_bus, lv_kv))?;
        Ok(self
            .world_mut()
            .spawn(TransformerBundle {
                device,
                from_bus: FromBus(hv_bus),
                to_bus: ToBus(lv_bus),
                name: Name::new(name.into()),
            })
            .id())
    }

    /// Adds a static generator, a fixed P/Q injection with generation positive.
    pub fn add_generator_injection(
        &mut self,
        name: impl Into<String>,
        bus: i64,
        p_mw: Megawatts,
        q_mvar: MVar,
        kind: GenerationKind,
    ) -> Result<Entity> {
        self.require_bus(bus)?;
        check_power(*p_mw, *q_mvar)?;
        Ok(self
            .world_mut()
            .spawn(SGenBundle::new(name, bus, p_mw, q_mvar, kind))
            .id())
    }

    /// Adds a constant power load, consumption positive.
    pub fn add_load(
        &mut self,
        name: impl Into<String>,
        bus: i64,
        p_mw: Megawatts,
        q_mvar: MVar,
    ) -> Result<Entity> {
        self.require_bus(bus)?;
        check_power(*p_mw, *q_mvar)?;
        Ok(self
            .world_mut()
            .spawn(LoadBundle::new(name, bus, p_mw, q_mvar))
            .id())
    }

    /// Switches an element in or out of service. Buses are always in service.
    pub fn set_in_service(&mut self, entity: Entity, in_service: bool) -> Result<()> {
        if self.get::<BusID>(entity).is_some() {
            return Err(SimError::invalid_input("buses cannot be taken out of service"));
        }
        let mut element = self
            .world_mut()
            .get_entity_mut(entity)
            .map_err(|_| SimError::invalid_input(format!("unknown element {entity}")))?;
        if in_service {
            element.remove::<OutOfService>();
        } else {
            element.insert(OutOfService);
        }
        Ok(())
    }

    /// Checks the assembled network before a solve.
    pub fn validate(&mut self) -> Result<()> {
        self.check_network().inspect_err(|e| warn!("network rejected: {e}"))
    }

    fn check_network(&mut self) -> Result<()> {
        let n_bus = self.bus_count();
        let lookup = self.world().resource::<NodeLookup>();
        if n_bus == 0 {
            return Err(SimError::invalid_network("network has no buses"));
        }
        if lookup.forward.len() != n_bus {
            return Err(SimError::invalid_network(format!(
                "bus ids must be contiguous from 0, highest id is {}",
                lookup.forward.len() - 1
            )));
        }

        let world = self.world_mut();
        let slack: Vec<i64> = world
            .query_filtered::<&TargetBus, (With<ExtGrid>, Without<OutOfService>)>()
            .iter(world)
            .map(|b| b.0)
            .collect();
        let slack_bus = match slack.as_slice() {
            [] => return Err(SimError::invalid_network("network has no slack bus")),
            [bus] => *bus,
            _ => {
                return Err(SimError::invalid_network(format!(
                    "network has {} slack buses, expected one",
                    slack.len()
                )));
            }
        };

        let targets: Vec<i64> = world
            .query_filtered::<&TargetBus, Without<OutOfService>>()
            .iter(world)
            .map(|b| b.0)
            .collect();
        let edges: Vec<(TransformerDevice, i64, i64)> = world
            .query_filtered::<(&TransformerDevice, &FromBus, &ToBus), Without<OutOfService>>()
            .iter(world)
            .map(|(dev, hv, lv)| (dev.clone(), hv.0, lv.0))
            .collect();
        let bus_kv: Vec<Option<f64>> = {
            let lookup = world.resource::<NodeLookup>();
            (0..n_bus as i64)
                .map(|id| {
                    lookup
                        .get_entity(id)
                        .and_then(|e| world.get::<VNominal>(e))
                        .map(|vn| vn.0.0)
                })
                .collect()
        };
        let kv = |id: i64| -> Result<f64> {
            usize::try_from(id)
                .ok()
                .and_then(|i| bus_kv.get(i).copied().flatten())
                .ok_or_else(|| SimError::invalid_network(format!("dangling bus id {id}")))
        };

        for bus in &targets {
            kv(*bus)?;
        }
        let mut adjacency = vec![Vec::new(); n_bus];
        for (dev, hv, lv) in &edges {
            check_transformer(dev, (*hv, kv(*hv)?), (*lv, kv(*lv)?))?;
            adjacency[*hv as usize].push(*lv as usize);
            adjacency[*lv as usize].push(*hv as usize);
        }

        let mut reached = vec![false; n_bus];
        let mut queue = VecDeque::from([slack_bus as usize]);
        reached[slack_bus as usize] = true;
        while let Some(bus) = queue.pop_front() {
            for &next in &adjacency[bus] {
                if !reached[next] {
                    reached[next] = true;
                    queue.push_back(next);
                }
            }
        }
        if let Some(isolated) = reached.iter().position(|r| !r) {
            return Err(SimError::invalid_network(format!(
                "bus {isolated} is not connected to the slack bus"
            )));
        }

        if let InitialGuess::Custom(guess) = &world.resource::<PowerFlowConfig>().init {
            if guess.len() != n_bus {
                return Err(SimError::invalid_network(format!(
                    "initial guess has {} entries for {n_bus} buses",
                    guess.len()
                )));
            }
            if guess.iter().any(|g| !(g.vm_pu.is_finite() && g.vm_pu > 0.0)) {
                return Err(SimError::invalid_network(
                    "initial guess magnitudes must be positive",
                ));
            }
        }
        Ok(())
    }

    /// Returns the nominal kV of `bus`, or an error when it does not exist.
    fn require_bus(&self, bus: i64) -> Result<f64> {
        self.bus_entity(bus)
            .and_then(|e| self.get::<VNominal>(e))
            .map(|vn| vn.0.0)
            .ok_or_else(|| SimError::invalid_network(format!("dangling bus id {bus}")))
    }

    fn count_in_service<T: Component>(&mut self) -> usize {
        let world = self.world_mut();
        world
            .query_filtered::<(), (With<T>, Without<OutOfService>)>()
            .iter(world)
            .count()
    }
}

fn check_setpoint(vm_pu: f64) -> Result<()> {
    if vm_pu.is_finite() && vm_pu > 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid_network(format!(
            "voltage setpoint must be positive, got {vm_pu} pu"
        )))
    }
}

fn check_power(p_mw: f64, q_mvar: f64) -> Result<()> {
    if p_mw.is_finite() && q_mvar.is_finite() {
        Ok(())
    } else {
        Err(SimError::invalid_input("injection power must be finite"))
    }
}

fn check_transformer(
    dev: &TransformerDevice,
    (hv_bus, hv_kv): (i64, f64),
    (lv_bus, lv_kv): (i64, f64),
) -> Result<()> {
    dev.validate()?;
    if hv_bus == lv_bus {
        return Err(SimError::invalid_network(format!(
            "transformer connects bus {hv_bus} to itself"
        )));
    }
    for (side, rated, bus, bus_kv) in [
        ("HV", dev.vn_hv_kv, hv_bus, hv_kv),
        ("LV", dev.vn_lv_kv, lv_bus, lv_kv),
    ] {
        if ((rated - bus_kv) / bus_kv).abs() > VOLTAGE_MATCH_TOLERANCE {
            return Err(SimError::invalid_network(format!(
                "transformer {side} rating {rated} kV does not match bus {bus} at {bus_kv} kV"
            )));
        }
    }
    Ok(())
}

impl PowerFlow for PowerGrid {
    fn init_pf_net(&mut self) -> Result<()> {
        self.validate()?;
        self.world_mut()
            .try_run_schedule(BuildNetwork)
            .map_err(|e| SimError::invalid_network(e.to_string()))?;
        debug!(buses = self.bus_count(), "network assembled");
        Ok(())
    }

    fn run_pf(&mut self) -> Result<PowerFlowResult> {
        self.init_pf_net()?;
        self.world_mut()
            .try_run_schedule(SolvePowerFlow)
            .map_err(|e| SimError::invalid_network(e.to_string()))?;
        let res = self
            .world()
            .get_resource::<PowerFlowResult>()
            .cloned()
            .ok_or_else(|| SimError::invalid_network("power flow produced no result"))?;
        if res.converged {
            info!(iterations = res.iterations, "power flow converged");
        } else {
            warn!(
                iterations = res.iterations,
                max_mismatch = res.max_mismatch,
                "power flow did not converge"
            );
        }
        Ok(res)
    }
}

impl DataOps for PowerGrid {
    fn world(&self) -> &World {
        self.app().world()
    }
    fn world_mut(&mut self) -> &mut World {
        self.app_mut().world_mut()
    }
    fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.world().get(entity)
    }
    fn get_mut<T>(&'_ mut self, entity: Entity) -> Option<Mut<'_, T>>
    where
        T: Component<Mutability = Mutable>,
    {
        self.world_mut().get_mut(entity)
    }
}
