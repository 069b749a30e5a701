use std::time::Duration;

use complaint_map::config::ViewConfig;
use complaint_map::proximity::{degree_distance, nearby, DEFAULT_NEARBY_LIMIT};
use complaint_map::store::ComplaintSource;
use complaint_map::surface::{RecordingSurface, SurfaceEvent, SurfaceOp};
use complaint_map::{ComplaintMapView, IssueType, JsonFileSource};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Library logs go to stderr so command output on stdout stays clean.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" || args[1] == "help" {
        print_help();
        return;
    }

    let result = match args[1].as_str() {
        "colors" => {
            print_colors();
            Ok(())
        }
        "nearby" => run_nearby(&args[2..]).await,
        "simulate" => run_simulate(&args[2..]).await,
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_help() {
    println!("complaint_map - offline tools for a complaints.json file\n");
    println!("Usage:");
    println!("  complaint_map nearby <complaints.json> <index> [limit]");
    println!("      List complaints within 0.005 degrees of complaint <index>.");
    println!("  complaint_map simulate <complaints.json> [seconds]");
    println!("      Mount a headless map and report markers, layers and pulses.");
    println!("  complaint_map colors");
    println!("      Show the issue-type color table.");
}

fn print_colors() {
    for t in IssueType::KNOWN.iter() {
        println!("{:<22} {}", t.label(), t.color());
    }
    println!("{:<22} {}", "Other", IssueType::from("Other").color());
}

async fn run_nearby(args: &[String]) -> Result<(), String> {
    let [path, index, rest @ ..] = args else {
        return Err("usage: complaint_map nearby <complaints.json> <index> [limit]".to_string());
    };
    let index: usize = index.parse().map_err(|e| format!("bad index: {e}"))?;
    let limit = match rest.first() {
        Some(l) => l.parse().map_err(|e| format!("bad limit: {e}"))?,
        None => DEFAULT_NEARBY_LIMIT,
    };

    let all = JsonFileSource::new(path)
        .fetch()
        .await
        .map_err(|e| e.to_string())?;
    let target = all
        .get(index)
        .ok_or_else(|| format!("index {index} out of range ({} complaints)", all.len()))?;

    println!(
        "#{index} {} @ {} ({})",
        target.issue_type, target.coordinates, target.location
    );
    let hits = nearby(target, &all, limit);
    if hits.is_empty() {
        println!("  no nearby complaints");
    }
    for hit in hits {
        println!(
            "  {:<22} {:.5}°  {}  {}",
            hit.issue_type.label(),
            degree_distance(target.coordinates, hit.coordinates),
            hit.date,
            hit.description
        );
    }
    Ok(())
}

async fn run_simulate(args: &[String]) -> Result<(), String> {
    let Some(path) = args.first() else {
        return Err("usage: complaint_map simulate <complaints.json> [seconds]".to_string());
    };
    let seconds: u64 = match args.get(1) {
        Some(s) => s.parse().map_err(|e| format!("bad seconds: {e}"))?,
        None => 30,
    };

    let config = ViewConfig::from_env();
    let surface = RecordingSurface::new(config.map_options());
    let probe = surface.clone();
    let source = JsonFileSource::new(path);

    let view = ComplaintMapView::mount(Box::new(surface), &source, config).await;
    probe.set_loaded(true);
    view.handle_event(SurfaceEvent::Loaded).await;

    let stats = view.stats().await;
    println!(
        "mounted: complaints={} markers={} layers={}",
        stats.complaints,
        stats.markers,
        probe.lock().layers.len()
    );

    tokio::time::sleep(Duration::from_secs(seconds)).await;

    let pulses = probe
        .lock()
        .log
        .iter()
        .filter(|c| matches!(&c.op, SurfaceOp::AddMarker { spec, .. } if !spec.interactive))
        .count();
    println!("pulses shown in {seconds}s: {pulses}");

    view.teardown().await;
    Ok(())
}
