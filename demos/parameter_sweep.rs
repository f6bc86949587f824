use std::time::Instant;

use hybridpower::prelude::*;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let base = SimulationConfig::default();
    let tilts = [10.0, 20.0, 30.0, 40.0, 50.0];
    let winds = [4.0, 8.0, 12.0];
    let loads = [0.1, 0.3, 0.5];
    let cases = SweepCase::grid(&tilts, &winds, &loads);

    let start = Instant::now();
    let outcomes = run_sweep(&base, &cases).unwrap();
    println!("{} cases in {:?}", outcomes.len(), start.elapsed());

    println!("| tilt | wind (m/s) | load (MW) | PV noon (MW) | wind (MW) | Vm LV (pu) | loading (%) |");
    println!("|-----:|-----------:|----------:|-------------:|----------:|-----------:|------------:|");
    for o in &outcomes {
        for snap in &o.result.snapshots {
            let vm = snap
                .power_flow
                .buses
                .iter()
                .map(|b| b.vm_pu)
                .fold(f64::INFINITY, f64::min);
            println!(
                "| {:>4.0} | {:>10.1} | {:>9.2} | {:>12.4} | {:>9.4} | {:>10.4} | {:>11.1} |",
                o.case.tilt,
                o.case.wind_speed,
                o.case.load_mw,
                snap.pv_mw.0,
                snap.wind_mw.0,
                vm,
                snap.power_flow.max_loading_percent()
            );
        }
    }
}
