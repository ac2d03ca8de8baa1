use anyhow::Result;
use hypersight::cli::parse_cli;
use hypersight::logging::init_logging;

fn main() -> Result<()> {
    let cli = parse_cli();
    init_logging(cli.log_format);
    hypersight::run(cli)
}
