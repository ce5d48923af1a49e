//! Replay a synthetic walk through an in-memory session and print the chart

use steptally::{AccelerationSample, DetectorConfig, StepSession};

fn main() {
    let mut samples = Vec::new();
    let mut t = 1_000;
    for _ in 0..20 {
        for m in [9.8_f32, 11.2, 13.9, 15.1, 12.0, 8.7, 7.9, 9.6] {
            samples.push(AccelerationSample::new(0.3, 0.2, m, t));
            t += 65;
        }
    }

    let mut session = match StepSession::in_memory(DetectorConfig::default()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    let result = session
        .subscribe(Some(samples.into_iter()))
        .and_then(|mut subscription| subscription.pump());

    match result.and_then(|_| session.commit()).and_then(|_| session.chart()) {
        Ok(series) => match serde_json::to_string_pretty(&series) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error: {e}"),
        },
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
