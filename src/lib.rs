pub mod app;

use std::io;

use tracing::{error, info};
use uuid::Uuid;

use app::adb::executor::ProcessAdb;
use app::adb::locator::resolve_adb_program;
use app::config::{load_config, AppConfig};
use app::logging::init_logging;
use app::server::McpServer;
use app::state::DeviceSession;

/// Serves MCP on stdin/stdout until the client closes stdin.
pub fn run() -> Result<(), app::error::AppError> {
    let trace_id = Uuid::new_v4().to_string();
    let (config, config_error) = match load_config(&trace_id) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };
    init_logging(&config.logging.level);
    if let Some(err) = config_error {
        error!(trace_id = %err.trace_id, error = %err.error, "config unusable, falling back to defaults");
    }

    let program = resolve_adb_program(
        &config.adb.command_path,
        config.timeouts.probe(),
        &trace_id,
    );
    info!(trace_id = %trace_id, adb = %program, "adb resolved");
    let adb = ProcessAdb::new(program);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut server = McpServer::new(&adb, &config, DeviceSession::new());
    server.serve(stdin.lock(), stdout.lock())
}
