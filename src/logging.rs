use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

pub fn setup<Level>(verbosity: clap_verbosity_flag::Verbosity<Level>)
where
    Level: clap_verbosity_flag::LogLevel,
{
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();

    if let Some(level_filter) = verbosity
        .is_present()
        .then(|| verbosity.tracing_level_filter())
    {
        let directive = tracing_subscriber::filter::Directive::from(level_filter);
        env_filter = env_filter.add_directive(directive);
    }

    // The journal adds its own timestamps and does not render colours.
    let under_journal = std::env::var_os("JOURNAL_STREAM").is_some();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!under_journal);
    let fmt_layer = if under_journal {
        fmt_layer.without_time().with_filter(env_filter).boxed()
    } else {
        fmt_layer.with_filter(env_filter).boxed()
    };

    let subscriber = tracing_subscriber::registry::Registry::default().with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber).expect("Setting up logger works");
}
