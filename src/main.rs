use anyhow::Result;

fn main() -> Result<()> {
    // Initialize logging and load configuration
    tempo_core::init()?;

    let (config, _validation) = tempo_core::Config::load_validated()?;

    tracing::info!("Tempo started");

    println!("Tempo - Personal Calendar");
    println!("\nConfiguration:");
    println!("  Persistence API: {}", config.api.base_url);
    println!("  Default view:    {}", config.ui.default_view);

    let client = tempo_calendar::PersistenceClient::new(&config.api.base_url);
    let _session = tempo_calendar::CalendarSession::new(client);
    tracing::info!("Calendar session ready");

    Ok(())
}
