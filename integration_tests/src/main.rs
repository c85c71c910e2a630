//! Integration tests for the AT bridge firmware.
//!
//! Run after flashing the firmware, with a USB-UART adapter on the command
//! UART. The full run ends with BEGIN, so reset the device between full
//! runs or pass `--no-begin`.

mod device;
mod protocol;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use device::{find_command_ports, resolve_port, DeviceClient};
use tests::{print_results, run_all_tests};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "AT command tests for the bridge firmware over its UART")]
struct Args {
    /// Command UART (use "auto" to probe ttyUSB/ttyACM ports)
    #[arg(short, long, default_value = "auto")]
    port: String,

    /// Baud rate of the command UART
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// How long to wait for each reply
    #[arg(long, default_value = "2000")]
    reply_timeout_ms: u64,

    /// Leave the link unbegun so the run can be repeated without a reset
    #[arg(long)]
    no_begin: bool,

    /// Print the ports that answer VERSION and exit
    #[arg(long)]
    list_ports: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.list_ports {
        let ports = find_command_ports()?;
        if ports.is_empty() {
            println!("{}", "No bridge found on any serial port".yellow());
        }
        for port in ports {
            println!("{}", port);
        }
        return Ok(());
    }

    let port = resolve_port(&args.port)?;
    println!("{}", "AT Bridge Integration Tests".bold());
    println!("Command UART: {} @ {} baud", port, args.baud);

    let mut device = DeviceClient::new(&port, args.baud)?;
    device.set_timeout(Duration::from_millis(args.reply_timeout_ms));

    // Anything the device printed while booting is not a reply
    std::thread::sleep(Duration::from_secs(1));
    device.drain_buffer()?;

    let version = device.send("VERSION")?;
    if !version.is_ok() {
        anyhow::bail!("Device did not answer VERSION: {:?}", version);
    }
    println!("Firmware: {}", version.text.green());
    if args.no_begin {
        println!("{}", "BEGIN cases skipped".yellow());
    }

    println!("\nRunning tests...\n");
    let results = run_all_tests(&mut device, !args.no_begin);
    print_results(&results);

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}
