//! Binary entrypoint for the interactive `IntellBee` client.

use std::process::ExitCode;

use intellbee_client::start_intellbee;

/// Load configuration, fetch history and run the chat loop on stdin.
fn main() -> ExitCode {
    start_intellbee::run()
}
