use clap::Parser;
use derive_getters::Getters;

#[derive(Parser, Debug, Getters)]
#[command(name = "traffic-maker")]
#[command(about = "Generate weighted HTTP traffic against a host", long_about = None)]
pub struct CliArgs {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    target: String,

    /// Requests per second, per stream.
    #[arg(long, default_value_t = 10)]
    rate: u64,

    #[arg(long, default_value_t = 10)]
    batch_size: usize,

    #[arg(long, default_value_t = 1)]
    streams: usize,
}
