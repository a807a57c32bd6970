use goalgrid::app;

/// Main entry point for the web service
///
/// Initializes logging and runs the GoalGrid HTTP server. The listen address
/// and data directory are read from the environment inside `app::run`.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    app::run().await
}
