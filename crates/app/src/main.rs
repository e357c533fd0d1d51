use signal_bot::Bot;

mod error;
mod settings;
mod transport;

fn main() -> error::Result<()> {
    let settings = settings::load()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(format!(
            "splitbot={level},signal_bot={level},engine={level}",
            level = settings.level
        ))
        .init();

    let mut builder = Bot::builder().plugins(settings.plugins.clone());
    if let Some(split) = &settings.split {
        tracing::info!("Found split settings...");
        builder = builder.split(split.to_config()?);
    }

    let mut bot = match builder.build() {
        Ok(bot) => bot,
        Err(err) => {
            tracing::error!("failed to initialize bot: {err}");
            return Err(err.into());
        }
    };
    tracing::info!("Loaded plugins: {}", bot.plugin_names().join(", "));

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    transport::run(&mut bot, stdin.lock(), stdout.lock())
}
