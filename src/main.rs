use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use ipcbus::{MsgQueue, Priority, QueueOptions, Timeout};

#[derive(Parser)]
#[command(about = "Create, feed, and drain a bounded message queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Repeatedly send payloads into a named queue, creating it first.
    Producer {
        name: String,
        #[arg(long, default_value_t = 16)]
        capacity: i32,
        #[arg(long, default_value_t = 256)]
        max_len: u32,
        #[arg(long, value_enum, default_value_t = CliOptions::Fifo)]
        options: CliOptions,
        #[arg(long, value_enum, default_value_t = CliPriority::Normal)]
        priority: CliPriority,
        #[arg(long, default_value_t = 4)]
        rate_hz: u64,
    },
    /// Attach to an existing named queue and print each message received.
    Consumer { name: String },
    /// Print the stat fields of an existing named queue.
    Stat { name: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum CliOptions {
    Fifo,
    Priority,
}

impl From<CliOptions> for QueueOptions {
    fn from(value: CliOptions) -> Self {
        match value {
            CliOptions::Fifo => QueueOptions::Fifo,
            CliOptions::Priority => QueueOptions::Priority,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliPriority {
    Normal,
    Urgent,
}

impl From<CliPriority> for Priority {
    fn from(value: CliPriority) -> Self {
        match value {
            CliPriority::Normal => Priority::Normal,
            CliPriority::Urgent => Priority::Urgent,
        }
    }
}

fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

fn run_producer(
    name: &str,
    capacity: i32,
    max_len: u32,
    options: QueueOptions,
    priority: Priority,
    rate_hz: u64,
) {
    let queue = MsgQueue::create(capacity, max_len, options, Some(name))
        .expect("create/attach queue");
    let interval = if rate_hz == 0 { Duration::from_millis(250) } else { Duration::from_millis(1000 / rate_hz) };

    println!("[producer] queue='{name}' capacity={capacity} max_len={max_len} rate={rate_hz} msg/s");

    let mut seq: u64 = 0;
    loop {
        let payload = format!("seq={seq} ts={}ms", now_ms());
        match queue.send(payload.as_bytes(), Timeout::Forever, priority) {
            Ok(()) => println!("[producer] sent #{seq}: '{payload}'"),
            Err(err) => eprintln!("[producer] send failed: {err}"),
        }
        seq = seq.wrapping_add(1);
        thread::sleep(interval);
    }
}

fn run_consumer(name: &str) {
    let queue = MsgQueue::open(name).expect("open queue");
    println!("[consumer] attached to queue='{name}', waiting for messages...");

    let mut buf = vec![0u8; queue.stat().max_len as usize];
    loop {
        match queue.receive(&mut buf, Timeout::Forever) {
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                println!("[consumer] received {n} bytes: '{text}'");
            }
            Err(err) => eprintln!("[consumer] receive failed: {err}"),
        }
    }
}

fn run_stat(name: &str) {
    let queue = MsgQueue::open(name).expect("open queue");
    queue.show();
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Producer { name, capacity, max_len, options, priority, rate_hz } => {
            run_producer(&name, capacity, max_len, options.into(), priority.into(), rate_hz);
        }
        Command::Consumer { name } => run_consumer(&name),
        Command::Stat { name } => run_stat(&name),
    }
}
