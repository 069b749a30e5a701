//! CLI client for the `complaintd` daemon.
//!
//! Examples:
//!   complaint-cli status
//!   complaint-cli list
//!   complaint-cli submit "Illegal Dumping" 37.4301 -122.1702 "Mattress on curb"
//!   complaint-cli nearby 3
//!   complaint-cli select 3
//!   complaint-cli close
//!
//! By default it talks to 127.0.0.1:9877; override with `--addr host:port`.

use complaint_map::complaint::ComplaintSubmission;
use complaint_map::selection::PanelView;
use complaint_map::Complaint;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    GetComplaints,
    SubmitComplaint { complaint: ComplaintSubmission },
    Nearby { index: usize, limit: Option<usize> },
    Select { index: usize },
    SelectNearby { n: usize },
    ToggleNearby,
    ClosePanel,
    GetPanel,
    GetStatus,
    Refresh,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Response {
    Complaints { complaints: Vec<Complaint> },
    Nearby { index: usize, nearby: Vec<NearbyHit> },
    Panel(PanelView),
    Status(StatusSnapshot),
    Success { message: String },
    Error { status: u16, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NearbyHit {
    index: usize,
    issue_type: String,
    distance_deg: f64,
    description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusSnapshot {
    complaints: usize,
    markers: usize,
    pulses: usize,
    selected: Option<usize>,
    awaiting_load: bool,
    #[serde(default)]
    chains: Vec<String>,
    #[serde(default)]
    data_file: String,
}

fn usage() -> ! {
    eprintln!("complaint-cli (talks to complaintd @ 127.0.0.1:9877 by default)");
    eprintln!("Usage: complaint-cli [--addr host:port] <command> [args]\n");
    eprintln!("Commands:");
    eprintln!("  status                          Show map view state");
    eprintln!("  list                            List stored complaints");
    eprintln!("  submit <issue> <lat> <lon> [description] [date]");
    eprintln!("                                  Store a new complaint");
    eprintln!("  nearby <index> [limit]          Complaints within 0.005 degrees");
    eprintln!("  select <index>                  Open the detail panel");
    eprintln!("  pick <n>                        Select the n-th nearby entry");
    eprintln!("  toggle                          Collapse or expand the nearby list");
    eprintln!("  panel | close                   Show or close the detail panel");
    eprintln!("  refresh                         Reload complaints into the map");
    eprintln!("  shutdown                        Tear down the map and exit daemon");
    process::exit(1);
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    let mut addr = "127.0.0.1:9877".to_string();
    if args.len() >= 2 && args[0] == "--addr" {
        addr = args[1].clone();
        args.drain(0..2);
    }

    if args.is_empty() {
        usage();
    }

    (addr, args)
}

fn send_request(addr: &str, req: &Request) -> Result<Response, String> {
    let mut stream = TcpStream::connect(addr).map_err(|e| format!("connect: {e}"))?;
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .map_err(|e| format!("set_read_timeout: {e}"))?;
    let mut reader = BufReader::new(stream.try_clone().map_err(|e| format!("clone: {e}"))?);

    let line = serde_json::to_string(req).map_err(|e| format!("serialize: {e}"))?;
    stream
        .write_all(line.as_bytes())
        .and_then(|_| stream.write_all(b"\n"))
        .map_err(|e| format!("send: {e}"))?;

    let mut resp_line = String::new();
    reader
        .read_line(&mut resp_line)
        .map_err(|e| format!("recv: {e}"))?;
    serde_json::from_str(&resp_line).map_err(|e| format!("parse response: {e}"))
}

fn print_complaints(complaints: &[Complaint]) {
    if complaints.is_empty() {
        println!("no complaints");
    }
    for (i, c) in complaints.iter().enumerate() {
        println!(
            "#{:<4} {:<22} {}  {}  {}",
            i,
            c.issue_type.label(),
            c.date,
            c.coordinates,
            c.description
        );
    }
}

fn print_panel(panel: PanelView) {
    match panel {
        PanelView::Empty { hint } => println!("{hint}"),
        PanelView::Detail(d) => {
            println!("#{} {} ({})", d.index, d.issue_type, d.color);
            println!("  Location:      {}", d.location);
            println!("  Description:   {}", d.description);
            println!("  Category:      {}", d.category);
            println!("  Date Reported: {}", d.date_reported);
            println!("  Source:        {}", d.source);
            for link in &d.source_links {
                println!("    {} {}", link.label, link.url);
            }
            println!("  Coordinates:   {}", d.coordinates);
            if !d.nearby_open {
                println!("  Nearby Complaints ({}) [collapsed]", d.nearby.len());
                return;
            }
            println!("  Nearby Complaints ({})", d.nearby.len());
            for (n, e) in d.nearby.iter().enumerate() {
                println!(
                    "    [{}] #{} {} - {} ({}, {})",
                    n, e.index, e.issue_type, e.description, e.category, e.date
                );
            }
        }
    }
}

fn print_status(s: StatusSnapshot) {
    println!(
        "complaints={} markers={} pulses={} selected={} awaiting_load={}",
        s.complaints,
        s.markers,
        s.pulses,
        s.selected
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_string()),
        s.awaiting_load,
    );
    println!("chains: {}", s.chains.join(", "));
    println!("data file: {}", s.data_file);
}

fn main() {
    let (addr, args) = parse_args();
    let cmd = &args[0];

    let make_error = |msg: &str| -> ! {
        eprintln!("{}", msg);
        process::exit(1);
    };

    let parse_index = |i: usize, what: &str| -> usize {
        match args.get(i) {
            Some(raw) => raw
                .parse()
                .unwrap_or_else(|_| make_error(&format!("{what} must be a non-negative integer"))),
            None => usage(),
        }
    };

    let req = match cmd.as_str() {
        "status" => Request::GetStatus,
        "list" => Request::GetComplaints,
        "submit" => {
            if args.len() < 4 {
                usage();
            }
            let lat: f64 = args[2]
                .parse()
                .unwrap_or_else(|_| make_error("lat must be a number"));
            let lon: f64 = args[3]
                .parse()
                .unwrap_or_else(|_| make_error("lon must be a number"));
            Request::SubmitComplaint {
                complaint: ComplaintSubmission {
                    issue_type: Some(args[1].clone()),
                    description: args.get(4).cloned().unwrap_or_default(),
                    date: args.get(5).cloned(),
                    coordinates: Some([lat, lon]),
                    ..Default::default()
                },
            }
        }
        "nearby" => Request::Nearby {
            index: parse_index(1, "index"),
            limit: args.get(2).map(|raw| {
                raw.parse()
                    .unwrap_or_else(|_| make_error("limit must be a non-negative integer"))
            }),
        },
        "select" => Request::Select {
            index: parse_index(1, "index"),
        },
        "pick" => Request::SelectNearby {
            n: parse_index(1, "n"),
        },
        "toggle" => Request::ToggleNearby,
        "panel" => Request::GetPanel,
        "close" => Request::ClosePanel,
        "refresh" => Request::Refresh,
        "shutdown" => Request::Shutdown,
        _ => usage(),
    };

    match send_request(&addr, &req) {
        Ok(Response::Complaints { complaints }) => print_complaints(&complaints),
        Ok(Response::Nearby { index, nearby }) => {
            println!("nearby #{index}: {}", nearby.len());
            for hit in nearby {
                println!(
                    "  #{:<4} {:<22} {:.5}°  {}",
                    hit.index, hit.issue_type, hit.distance_deg, hit.description
                );
            }
        }
        Ok(Response::Panel(panel)) => print_panel(panel),
        Ok(Response::Status(s)) => print_status(s),
        Ok(Response::Success { message }) => println!("{message}"),
        Ok(Response::Error { status, message }) => {
            eprintln!("Error {status}: {message}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed: {e}");
            process::exit(1);
        }
    }
}
