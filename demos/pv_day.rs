use chrono::NaiveDate;
use hybridpower::prelude::*;
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Zenith")]
    zenith: String,
    #[tabled(rename = "GHI")]
    ghi: String,
    #[tabled(rename = "POA")]
    poa: String,
    #[tabled(rename = "PV_kW")]
    pv_kw: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let site = std::env::args()
        .nth(1)
        .and_then(|s| serde_json::from_value::<Site>(serde_json::Value::String(s)).ok())
        .unwrap_or(Site::Sokoto);
    let loc = site.location();
    let offset = loc.timezone().unwrap();
    let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let times = TimeSeries::hourly_day(date, offset).unwrap();

    let pv = PVArrayConfig::default();
    let positions = compute_solar_position(&loc, &times).unwrap();
    let clearsky = clearsky::clearsky_from_positions(&loc, &times, &positions, &pv.irradiance).unwrap();
    let out = pv.simulate(&positions, &clearsky).unwrap();

    let rows: Vec<Row> = times
        .iter()
        .zip(&positions)
        .zip(&clearsky)
        .zip(out.poa.iter().zip(out.injected()))
        .map(|(((t, pos), cs), (poa, p))| Row {
            time: t.format("%H:%M").to_string(),
            zenith: format!("{:.1}", pos.apparent_zenith),
            ghi: format!("{:.1}", cs.ghi),
            poa: format!("{:.1}", poa.poa_global),
            pv_kw: format!("{:.2}", p.0 / 1e3),
        })
        .collect();

    println!(
        "{} on {date}: solar noon at {}",
        loc.label(),
        solar_transit(&loc, date).unwrap().format("%H:%M")
    );
    println!("{}", Table::new(rows).with(Style::markdown()));
}
