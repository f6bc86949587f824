use hybridpower::prelude::*;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut turbine = WindTurbineConfig::default();
    turbine.cut_in_speed = Some(3.0);
    turbine.cut_out_speed = Some(25.0);

    println!(
        "rotor {} m², cp {}, rated {} reached at {:.2} m/s",
        turbine.rotor_area,
        turbine.cp,
        turbine.rated_power.to_mw(),
        turbine.rated_wind_speed()
    );
    println!("| v (m/s) | P (MW) |");
    println!("|--------:|-------:|");
    for step in 0..=54 {
        let v = step as f64 * 0.5;
        let p = turbine.power(v).unwrap();
        println!("| {v:>7.1} | {:>6.4} |", p.to_mw().0);
    }
}
