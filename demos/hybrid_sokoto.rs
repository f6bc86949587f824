use std::env;

use hybridpower::prelude::*;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = match env::args().nth(1) {
        Some(path) => SimulationConfig::load_json(path).unwrap(),
        None => {
            let dir = env::var("CARGO_MANIFEST_DIR").unwrap();
            SimulationConfig::load_json(format!("{dir}/demos/scenarios/sokoto.json")).unwrap()
        }
    };

    let res = match cfg.run() {
        Ok(res) => res,
        Err(SimError::SolverDivergence(last)) => {
            eprintln!("power flow did not converge, last iterate:");
            println!("{}", last.bus_table());
            return;
        }
        Err(e) => panic!("{e}"),
    };

    let s = &res.summary;
    println!("Location: {}", res.location.label());
    println!(
        "PV peak {:.4} MW, mean {:.4} MW, energy {:.3} MWh/day",
        s.peak_pv_mw, s.mean_pv_mw, s.pv_daily_energy_mwh
    );
    println!(
        "Wind mean {:.4} MW, hybrid mean {:.4} MW, load {}",
        s.mean_wind_mw, s.mean_hybrid_mw, res.load_mw
    );
    for snap in &res.snapshots {
        println!(
            "\n{} (PV {:.4} MW, wind {:.4} MW)",
            snap.timestamp, snap.pv_mw.0, snap.wind_mw.0
        );
        println!("{}", snap.power_flow);
    }
}
